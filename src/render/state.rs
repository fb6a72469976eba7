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

/// Per-page render state machine.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RenderState {
    Idle,
    Navigating,
    Waiting,
    Capturing,
    Done,
    Failed,
}

impl RenderState {
    pub fn can_transition_to(self, next: RenderState) -> bool {
        use RenderState::*;
        matches!(
            (self, next),
            (Idle, Navigating)
                | (Navigating, Waiting)
                | (Navigating, Failed)
                | (Waiting, Capturing)
                | (Waiting, Failed)
                | (Capturing, Done)
                | (Capturing, Failed)
                | (_, Failed)
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn happy_path_is_allowed() {
        assert!(RenderState::Idle.can_transition_to(RenderState::Navigating));
        assert!(RenderState::Navigating.can_transition_to(RenderState::Waiting));
        assert!(RenderState::Waiting.can_transition_to(RenderState::Capturing));
        assert!(RenderState::Capturing.can_transition_to(RenderState::Done));
    }

    #[test]
    fn any_state_can_fail() {
        assert!(RenderState::Navigating.can_transition_to(RenderState::Failed));
        assert!(RenderState::Capturing.can_transition_to(RenderState::Failed));
    }

    #[test]
    fn skipping_waiting_is_not_allowed() {
        assert!(!RenderState::Navigating.can_transition_to(RenderState::Capturing));
    }
}
