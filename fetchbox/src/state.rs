//! Request state and its reducer.
//!
//! | action    | `data` / `response` | `error`  | `is_loading` |
//! |-----------|---------------------|----------|--------------|
//! | `Start`   | kept                | cleared  | `true`       |
//! | `Success` | replaced            | cleared  | `false`      |
//! | `Error`   | kept                | set      | `false`      |
//! | `Reset`   | kept                | cleared  | `false`      |
//!
//! Data from the last success survives a later failure.

use fetchbox_core::{RawResponse, RequestError};

/// What a resource currently knows about its call.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestState<T> {
    /// Payload of the last success, a cache hit or the default state.
    pub data: Option<T>,
    /// Full response of the last success.
    pub response: Option<RawResponse>,
    /// Error of the last failed call, until the next action.
    pub error: Option<RequestError>,
    /// `true` while a call is in flight.
    pub is_loading: bool,
}

impl<T> Default for RequestState<T> {
    fn default() -> Self {
        Self {
            data: None,
            response: None,
            error: None,
            is_loading: false,
        }
    }
}

impl<T> RequestState<T> {
    /// An idle state holding `data`.
    pub fn with_data(data: Option<T>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }
}

/// Transition applied to a [`RequestState`].
#[derive(Debug, Clone, PartialEq)]
pub enum Action<T> {
    /// A call was issued.
    Start,
    /// A call succeeded.
    Success {
        /// Extracted payload.
        data: T,
        /// Full response.
        response: RawResponse,
    },
    /// A call failed.
    Error(RequestError),
    /// In-flight work was abandoned.
    Reset,
}

/// Computes the state after `action`.
pub fn reduce<T: Clone>(state: &RequestState<T>, action: Action<T>) -> RequestState<T> {
    match action {
        Action::Start => RequestState {
            data: state.data.clone(),
            response: state.response.clone(),
            error: None,
            is_loading: true,
        },
        Action::Success { data, response } => RequestState {
            data: Some(data),
            response: Some(response),
            error: None,
            is_loading: false,
        },
        Action::Error(error) => RequestState {
            data: state.data.clone(),
            response: state.response.clone(),
            error: Some(error),
            is_loading: false,
        },
        Action::Reset => RequestState {
            data: state.data.clone(),
            response: state.response.clone(),
            error: None,
            is_loading: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn success(data: u32) -> Action<u32> {
        Action::Success {
            data,
            response: RawResponse::ok(json!(data)),
        }
    }

    #[test]
    fn start_keeps_data_and_clears_error() {
        let state = RequestState {
            data: Some(1),
            response: None,
            error: Some(RequestError::default()),
            is_loading: false,
        };
        let next = reduce(&state, Action::Start);
        assert_eq!(next.data, Some(1));
        assert_eq!(next.error, None);
        assert!(next.is_loading);
    }

    #[test]
    fn success_replaces_data() {
        let loading = reduce(&RequestState::with_data(Some(1)), Action::Start);
        let next = reduce(&loading, success(2));
        assert_eq!(next.data, Some(2));
        assert_eq!(next.response, Some(RawResponse::ok(json!(2))));
        assert!(!next.is_loading);
    }

    #[test]
    fn error_retains_previous_data() {
        let done = reduce(&RequestState::default(), success(5));
        let loading = reduce(&done, Action::Start);
        let error = RequestError {
            message: Some("boom".into()),
            ..RequestError::default()
        };
        let next = reduce(&loading, Action::Error(error.clone()));
        assert_eq!(
            next,
            RequestState {
                data: Some(5),
                response: Some(RawResponse::ok(json!(5))),
                error: Some(error),
                is_loading: false,
            }
        );
    }

    #[test]
    fn reset_stops_loading() {
        let loading = reduce(&RequestState::with_data(Some(3)), Action::Start);
        let next = reduce(&loading, Action::Reset);
        assert_eq!(next, RequestState::with_data(Some(3)));
    }
}
