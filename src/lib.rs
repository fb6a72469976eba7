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

pub mod app;
pub mod archive;
pub mod blobstore;
pub mod browser;
pub mod checkpoint;
pub mod config;
pub mod cookies;
pub mod data;
pub mod dataset;
pub mod decoding;
pub mod extraction;
pub mod fetching;
pub mod frontier;
pub mod ids;
pub use ids::{AssetId, PageId};
pub mod manifest;
pub mod rate;
pub mod render;
pub mod robots;
pub mod scheduler;
pub mod schema;
pub mod toolkit;
pub mod url;
