#![warn(missing_docs)]
//! # fetchbox-reqwest
//!
//! A [`Transport`](fetchbox_core::Transport) for fetchbox backed by
//! [`reqwest`].
//!
//! ```ignore
//! use fetchbox::{ContextConfig, Params, RequestConfig, Resource};
//! use fetchbox_core::request;
//! use fetchbox_reqwest::ReqwestTransport;
//!
//! let transport = ReqwestTransport::builder()
//!     .client(reqwest::Client::new())
//!     .build();
//! let context = ContextConfig::new(transport);
//!
//! let todos = Resource::new(
//!     &context,
//!     |_: &()| request::<serde_json::Value>(RequestConfig::get("https://api.example.com/todos")),
//!     Params::Auto(()),
//! );
//! ```
//!
//! Request mapping:
//!
//! | `RequestConfig` | reqwest |
//! |-----------------|---------|
//! | `base_url` + `url` | request URL |
//! | `method` | method, `GET` when absent |
//! | `headers` | headers, over the transport defaults |
//! | `params` | query string |
//! | `data` | JSON body |

mod transport;

pub use transport::{ReqwestTransport, ReqwestTransportBuilder};
