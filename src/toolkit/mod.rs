// Copyright 2024 The Atlas Crawler Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Small helpers shared by more than one module that don't warrant their
//! own top-level module.

/// Splits everything after the first dot in a file name into its component
/// extensions (`archive.tar.gz` -> `["tar", "gz"]`). Returns `None` for a
/// name with no extension or one that is only a trailing dot.
pub fn extract_file_extensions(file_name: &str) -> Option<Vec<&str>> {
    let sep = file_name.find('.')?;
    if sep == file_name.len() - 1 {
        return None;
    }
    let parts: Vec<&str> = file_name[sep + 1..]
        .split_terminator('.')
        .filter(|part| !part.is_empty())
        .collect();
    (!parts.is_empty()).then_some(parts)
}

/// Best-effort MIME type guess from a URL's last path segment, used to fill
/// in `mime_type` for assets that don't carry an explicit `type` attribute
/// (notably `<img>`, where the browser infers type from content rather than
/// markup).
pub fn guess_mime_from_url(url: &str) -> Option<&'static str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file_name = path.rsplit('/').next()?;
    let extensions = extract_file_extensions(file_name)?;
    let ext = extensions.last()?.to_ascii_lowercase();
    Some(match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "bmp" => "image/bmp",
        _ => return None,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn splits_multiple_extensions() {
        assert_eq!(extract_file_extensions("archive.tar.gz"), Some(vec!["tar", "gz"]));
    }

    #[test]
    fn no_extension_returns_none() {
        assert_eq!(extract_file_extensions("README"), None);
        assert_eq!(extract_file_extensions("trailing."), None);
    }

    #[test]
    fn guesses_mime_from_query_string_and_fragment() {
        assert_eq!(guess_mime_from_url("https://example.com/img/logo.PNG?v=2#frag"), Some("image/png"));
        assert_eq!(guess_mime_from_url("https://example.com/img/logo"), None);
    }
}
