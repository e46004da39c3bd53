//! Request execution: settlement, cancellation, pending bookkeeping and
//! callbacks.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{MockTransport, flush};
use fetchbox::{
    ContextConfig, ContextOverride, RequestOptions, Requester, fetch, fetch_with_options, send,
};
use fetchbox_core::{
    ErrorCode, RawResponse, RequestConfig, RequestError, TransportFailure, request,
};
use http::{Method, StatusCode};
use pretty_assertions::assert_eq;
use serde::Deserialize;
use serde_json::json;

#[tokio::test]
async fn test_call_resolves_payload_and_response() {
    let transport = MockTransport::new();
    transport.reply("/users", json!([1, 2]));
    let requester = Requester::new(&transport.context(), |_: &()| {
        request::<Vec<u32>>(RequestConfig::get("/users"))
    });

    let (data, response) = requester.call(&()).ready().await.unwrap();
    assert_eq!(data, vec![1, 2]);
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data, json!([1, 2]));
    assert!(!requester.has_pending());
}

#[tokio::test]
async fn test_call_builds_request_from_args() {
    let transport = MockTransport::new();
    transport.reply_with("/echo", |config| {
        Ok(RawResponse::ok(
            config.params.clone().unwrap_or_default(),
        ))
    });
    let requester = Requester::new(&transport.context(), |(page, size): &(u32, u32)| {
        request::<serde_json::Value>(
            RequestConfig::get("/echo").with_params(json!({ "page": page, "size": size })),
        )
    });

    let call = requester.call(&(2, 10));
    assert_eq!(call.config().params, Some(json!({ "page": 2, "size": 10 })));
    // Nothing is sent before `ready`.
    assert_eq!(transport.call_count(), 0);

    let (data, _) = call.ready().await.unwrap();
    assert_eq!(data, json!({ "page": 2, "size": 10 }));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_status_failure_is_normalized() {
    let transport = MockTransport::new();
    transport.reply_status(
        "/broken",
        StatusCode::BAD_REQUEST,
        Some(json!({ "code": 2001, "data": [1, 2] })),
    );
    let requester = Requester::new(&transport.context(), |_: &()| {
        request::<Vec<u32>>(RequestConfig::get("/broken"))
    });

    let error = requester.call(&()).ready().await.unwrap_err();
    assert_eq!(error.code, Some(ErrorCode::Number(2001)));
    assert_eq!(error.data, Some(json!({ "code": 2001, "data": [1, 2] })));
    assert!(!error.is_cancel);
    assert!(error.original.is_some());
}

#[tokio::test]
async fn test_payload_type_mismatch_is_an_error() {
    let transport = MockTransport::new();
    transport.reply("/text", json!("not a list"));
    let requester = Requester::new(&transport.context(), |_: &()| {
        request::<Vec<u32>>(RequestConfig::get("/text"))
    });

    let error = requester.call(&()).ready().await.unwrap_err();
    assert!(!error.is_cancel);
    assert!(error.message.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_pending_set_tracks_in_flight_calls() {
    let transport = MockTransport::new();
    transport
        .reply("/slow", json!(1))
        .delay("/slow", Duration::from_millis(100));
    let requester = Requester::new(&transport.context(), |_: &()| {
        request::<u32>(RequestConfig::get("/slow"))
    });

    let ready = requester.call(&()).ready();
    // Registered as soon as `ready` returns, before the first poll.
    assert!(requester.has_pending());

    let data = tokio::spawn(ready).await.unwrap().unwrap().0;
    assert_eq!(data, 1);
    assert!(!requester.has_pending());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_settles_as_cancellation() {
    let transport = MockTransport::new();
    transport
        .reply("/slow", json!(1))
        .delay("/slow", Duration::from_secs(10));
    let requester = Requester::new(&transport.context(), |_: &()| {
        request::<u32>(RequestConfig::get("/slow"))
    });

    let call = requester.call(&());
    let canceller = call.canceller();
    let task = tokio::spawn(call.ready());
    flush().await;

    canceller.cancel(Some("user navigated away"));
    let error = task.await.unwrap().unwrap_err();
    assert!(error.is_cancel);
    assert_eq!(error.message.as_deref(), Some("user navigated away"));
    assert!(!requester.has_pending());
}

#[tokio::test(start_paused = true)]
async fn test_clear_cancels_every_pending_call() {
    let transport = MockTransport::new();
    transport
        .reply("/slow", json!(1))
        .delay("/slow", Duration::from_secs(10));
    let requester = Requester::new(&transport.context(), |_: &()| {
        request::<u32>(RequestConfig::get("/slow"))
    });

    let first = tokio::spawn(requester.call(&()).ready());
    let second = tokio::spawn(requester.call(&()).ready());
    assert!(requester.has_pending());

    requester.clear(Some("clear"));
    assert!(!requester.has_pending());
    for task in [first, second] {
        let error = task.await.unwrap().unwrap_err();
        assert!(error.is_cancel);
        assert_eq!(error.message.as_deref(), Some("clear"));
    }
}

#[tokio::test(start_paused = true)]
async fn test_dispose_stops_registration_and_cancels() {
    let transport = MockTransport::new();
    transport
        .reply("/slow", json!(1))
        .delay("/slow", Duration::from_secs(10));
    let requester = Requester::new(&transport.context(), |_: &()| {
        request::<u32>(RequestConfig::get("/slow"))
    });

    let in_flight = tokio::spawn(requester.call(&()).ready());
    requester.dispose();
    requester.dispose();
    assert!(!requester.lifecycle().is_active());
    assert!(in_flight.await.unwrap().unwrap_err().is_cancel);

    let late = requester.call(&()).ready();
    assert!(!requester.has_pending());
    drop(late);
}

#[tokio::test]
async fn test_callbacks_run_on_settlement() {
    let transport = MockTransport::new();
    transport.reply("/ok", json!("hello"));
    transport.reply_status("/bad", StatusCode::INTERNAL_SERVER_ERROR, None);

    let completed = Arc::new(Mutex::new(Vec::<String>::new()));
    let errors = Arc::new(Mutex::new(Vec::<Option<ErrorCode>>::new()));
    let options = RequestOptions::default()
        .on_completed({
            let completed = Arc::clone(&completed);
            move |data: &String, response: &RawResponse| {
                assert_eq!(response.status, StatusCode::OK);
                completed.lock().unwrap().push(data.clone());
            }
        })
        .on_error({
            let errors = Arc::clone(&errors);
            move |error: &RequestError| errors.lock().unwrap().push(error.code.clone())
        });
    let requester = Requester::with_options(
        &transport.context(),
        |url: &&'static str| request::<String>(RequestConfig::get(*url)),
        options,
    );

    requester.call(&"/ok").ready().await.unwrap();
    requester.call(&"/bad").ready().await.unwrap_err();

    assert_eq!(*completed.lock().unwrap(), vec!["hello".to_string()]);
    assert_eq!(*errors.lock().unwrap(), vec![Some(ErrorCode::Number(500))]);
}

#[tokio::test]
async fn test_transport_override_wins() {
    let ambient = MockTransport::new();
    ambient.reply("/who", json!("ambient"));
    let custom = MockTransport::new();
    custom.reply("/who", json!("custom"));

    let requester = Requester::with_options(
        &ambient.context(),
        |_: &()| request::<String>(RequestConfig::get("/who")),
        RequestOptions::default().transport(custom.clone()),
    );

    assert_eq!(requester.call(&()).ready().await.unwrap().0, "custom");
    assert_eq!(ambient.call_count(), 0);
    assert_eq!(custom.call_count(), 1);
}

#[tokio::test]
async fn test_response_item_picks_payload() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        name: String,
    }

    let transport = MockTransport::new();
    transport.reply("/user", json!({ "data": { "name": "ann" }, "meta": {} }));
    let context = transport.context().scoped(
        &ContextOverride::default().response_item(|response| response.data["data"].clone()),
    );
    let requester = Requester::new(&context, |_: &()| {
        request::<User>(RequestConfig::get("/user"))
    });

    let (user, response) = requester.call(&()).ready().await.unwrap();
    assert_eq!(user, User { name: "ann".into() });
    // The full body stays on the response.
    assert_eq!(response.data["meta"], json!({}));
}

#[tokio::test]
async fn test_custom_error_normalizer() {
    let transport = MockTransport::new();
    transport.fail("/down", TransportFailure::network("connection refused"));
    let context = transport.context().with_error_normalizer(|failure| RequestError {
        message: failure.and_then(|f| f.message.clone()).map(|m| m.to_uppercase()),
        code: Some(ErrorCode::from("E_CUSTOM")),
        ..RequestError::default()
    });
    let requester = Requester::new(&context, |_: &()| {
        request::<u32>(RequestConfig::get("/down"))
    });

    let error = requester.call(&()).ready().await.unwrap_err();
    assert_eq!(error.code, Some(ErrorCode::from("E_CUSTOM")));
    assert_eq!(error.message.as_deref(), Some("CONNECTION REFUSED"));
}

#[tokio::test]
async fn test_unconfigured_context_fails_every_call() {
    let requester = Requester::new(&ContextConfig::builder().build(), |_: &()| {
        request::<u32>(RequestConfig::get("/anything"))
    });
    let error = requester.call(&()).ready().await.unwrap_err();
    assert!(!error.is_cancel);
}

#[tokio::test]
async fn test_fetch_merges_base_and_call_config() {
    let transport = MockTransport::new();
    transport.reply_with("/items", |config| {
        Ok(RawResponse::ok(json!({
            "method": config.method.as_ref().map(|m| m.as_str()),
            "params": config.params,
            "auth": config.headers.get("authorization"),
        })))
    });

    let items = fetch::<serde_json::Value>(
        &transport.context(),
        RequestConfig::get("/items").with_header("authorization", "token"),
    );

    let (plain, _) = items.call(&RequestConfig::default()).ready().await.unwrap();
    assert_eq!(
        plain,
        json!({ "method": "GET", "params": null, "auth": "token" })
    );

    let (paged, _) = items
        .call(&RequestConfig::default().with_params(json!({ "page": 3 })))
        .ready()
        .await
        .unwrap();
    assert_eq!(paged["params"], json!({ "page": 3 }));
    assert_eq!(paged["auth"], json!("token"));
}

#[tokio::test]
async fn test_fetch_with_callbacks() {
    let transport = MockTransport::new();
    transport.reply("/post", json!({ "ok": true }));
    let seen: Arc<Mutex<Option<serde_json::Value>>> = Arc::new(Mutex::new(None));
    let items = fetch_with_options::<serde_json::Value>(
        &transport.context(),
        RequestConfig::post("/post"),
        RequestOptions::default().on_completed({
            let seen = Arc::clone(&seen);
            move |data: &serde_json::Value, _: &RawResponse| {
                *seen.lock().unwrap() = Some(data.clone())
            }
        }),
    );

    items
        .call(&RequestConfig::default().with_data(json!({ "x": 1 })))
        .ready()
        .await
        .unwrap();
    assert_eq!(*seen.lock().unwrap(), Some(json!({ "ok": true })));
    assert_eq!(transport.calls()[0].method, Some(Method::POST));
    assert_eq!(transport.calls()[0].data, Some(json!({ "x": 1 })));
}

#[tokio::test]
async fn test_send_one_shot() {
    let transport = MockTransport::new();
    transport.reply("/hello", json!("hello"));

    let (data, response) = send(&transport, request::<String>(RequestConfig::new("/hello")))
        .await
        .unwrap();
    assert_eq!(data, "hello");
    assert_eq!(response.status_text(), "OK");

    let error = send(&transport, request::<String>(RequestConfig::new("/missing")))
        .await
        .unwrap_err();
    assert_eq!(error.code, Some(ErrorCode::Number(404)));
}
