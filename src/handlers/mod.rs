pub mod chat;

use crate::error::ChatError;
use crate::services::ChatService;
use log::{debug, error, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use warp::filters::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::{reject, reply, Filter, Rejection, Reply};

const MAX_BODY_BYTES: u64 = 64 * 1024;

#[derive(Serialize)]
struct OkEnvelope<'a, T> {
    ok: bool,
    #[serde(flatten)]
    body: &'a T,
}

pub fn ok_reply<T: Serialize>(body: &T) -> reply::Response {
    reply::with_status(
        reply::json(&OkEnvelope { ok: true, body }),
        StatusCode::OK,
    )
    .into_response()
}

/// Every failure leaves as `{"ok": false, "error": {"code", "message"}}` so
/// callers branch on `code` rather than on the status line or text.
pub fn error_reply(e: &ChatError) -> reply::Response {
    if e.status().is_server_error() {
        warn!("request failed: {}", e);
    } else {
        debug!("request rejected: {}", e);
    }
    coded_reply(e.code(), &e.to_string(), e.status())
}

fn coded_reply(code: &str, message: &str, status: StatusCode) -> reply::Response {
    let body = serde_json::json!({
        "ok": false,
        "error": { "code": code, "message": message },
    });
    reply::with_status(reply::json(&body), status).into_response()
}

pub async fn handle_rejection(err: Rejection) -> Result<reply::Response, Infallible> {
    if let Some(e) = err.find::<BodyDeserializeError>() {
        return Ok(error_reply(&ChatError::InvalidArgument(e.to_string())));
    }
    if err.find::<reject::PayloadTooLarge>().is_some() {
        return Ok(coded_reply(
            "PAYLOAD_TOO_LARGE",
            "request body too large",
            StatusCode::PAYLOAD_TOO_LARGE,
        ));
    }
    if err.is_not_found() {
        return Ok(coded_reply("UNKNOWN_METHOD", "no such RPC method", StatusCode::NOT_FOUND));
    }
    if err.find::<reject::MethodNotAllowed>().is_some() {
        return Ok(coded_reply(
            "METHOD_NOT_ALLOWED",
            "RPC methods are called with POST",
            StatusCode::METHOD_NOT_ALLOWED,
        ));
    }

    error!("unhandled rejection: {:?}", err);
    Ok(coded_reply(
        "INTERNAL",
        "unhandled error",
        StatusCode::INTERNAL_SERVER_ERROR,
    ))
}

fn with_service(
    service: Arc<ChatService>,
) -> impl Filter<Extract = (Arc<ChatService>,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}

fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

/// `POST /rpc/<Method>` with a JSON body for each chat operation.
pub fn routes(
    service: Arc<ChatService>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let send_message = warp::path!("rpc" / "SendMessage")
        .and(warp::post())
        .and(json_body())
        .and(with_service(service.clone()))
        .and_then(chat::send_message_handler);

    let mark_read = warp::path!("rpc" / "MarkRead")
        .and(warp::post())
        .and(json_body())
        .and(with_service(service.clone()))
        .and_then(chat::mark_read_handler);

    let list_messages = warp::path!("rpc" / "ListMessages")
        .and(warp::post())
        .and(json_body())
        .and(with_service(service.clone()))
        .and_then(chat::list_messages_handler);

    let create_conversation = warp::path!("rpc" / "CreateConversation")
        .and(warp::post())
        .and(json_body())
        .and(with_service(service.clone()))
        .and_then(chat::create_conversation_handler);

    let register_image = warp::path!("rpc" / "RegisterImage")
        .and(warp::post())
        .and(json_body())
        .and(with_service(service.clone()))
        .and_then(chat::register_image_handler);

    let get_conversation = warp::path!("rpc" / "GetConversation")
        .and(warp::post())
        .and(json_body())
        .and(with_service(service))
        .and_then(chat::get_conversation_handler);

    send_message
        .or(mark_read)
        .or(list_messages)
        .or(create_conversation)
        .or(register_image)
        .or(get_conversation)
        .recover(handle_rejection)
        .with(warp::log("chat_ledger::rpc"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::db::retry::RetryConfig;
    use crate::db::testing::participant;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn service() -> Arc<ChatService> {
        Arc::new(ChatService::with_settings(
            Arc::new(MemoryStore::new()),
            RetryConfig::default(),
            Duration::from_secs(5),
        ))
    }

    async fn call(service: &Arc<ChatService>, method: &str, body: Value) -> (StatusCode, Value) {
        let routes = routes(service.clone());
        let response = warp::test::request()
            .method("POST")
            .path(&format!("/rpc/{method}"))
            .json(&body)
            .reply(&routes)
            .await;
        let json = serde_json::from_slice(response.body()).expect("json body");
        (response.status(), json)
    }

    async fn conversation(service: &Arc<ChatService>, members: &[&String]) -> String {
        let (status, body) = call(service, "CreateConversation", json!({ "participants": members })).await;
        assert_eq!(status, StatusCode::OK);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn send_message_acknowledges_with_id_and_timestamp() {
        let service = service();
        let a = participant();
        let conversation_id = conversation(&service, &[&a]).await;

        let (status, body) = call(
            &service,
            "SendMessage",
            json!({ "conversationId": conversation_id, "senderId": a, "content": "hi" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["messageId"].as_str().unwrap().len(), 24);
        assert!(body["createdAt"].is_string());
    }

    #[tokio::test]
    async fn business_errors_are_structured() {
        let service = service();
        let a = participant();
        let outsider = participant();
        let conversation_id = conversation(&service, &[&a]).await;

        let (status, body) = call(
            &service,
            "SendMessage",
            json!({ "conversationId": conversation_id, "senderId": outsider, "content": "hi" }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"]["code"], "NOT_A_PARTICIPANT");

        let (status, body) = call(
            &service,
            "SendMessage",
            json!({ "conversationId": conversation_id, "senderId": "0123456789", "content": "hi" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_SENDER");
    }

    #[tokio::test]
    async fn malformed_requests_are_invalid_arguments() {
        let service = service();

        let (status, body) = call(
            &service,
            "SendMessage",
            json!({ "conversationId": "not-an-id", "senderId": participant() }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_ARGUMENT");

        let (status, body) = call(&service, "SendMessage", json!({ "content": "hi" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn unknown_method_is_reported() {
        let (status, body) = call(&service(), "DeleteMessage", json!({})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "UNKNOWN_METHOD");
    }

    #[tokio::test]
    async fn transport_rejections_are_structured() {
        let routes = routes(service());

        let response = warp::test::request()
            .method("GET")
            .path("/rpc/SendMessage")
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"]["code"], "METHOD_NOT_ALLOWED");

        let oversized = "x".repeat(MAX_BODY_BYTES as usize + 1);
        let response = warp::test::request()
            .method("POST")
            .path("/rpc/SendMessage")
            .json(&json!({ "content": oversized }))
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
    }

    #[tokio::test]
    async fn mark_read_then_list_pages_through_history() {
        let service = service();
        let a = participant();
        let b = participant();
        let conversation_id = conversation(&service, &[&a, &b]).await;

        let mut sent = Vec::new();
        for text in ["one", "two", "three"] {
            let (_, body) = call(
                &service,
                "SendMessage",
                json!({ "conversationId": conversation_id, "senderId": a, "content": text }),
            )
            .await;
            sent.push(body["messageId"].as_str().unwrap().to_string());
        }

        let (status, body) = call(
            &service,
            "MarkRead",
            json!({ "messageId": sent[2], "readerId": b }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));

        let (_, first) = call(
            &service,
            "ListMessages",
            json!({ "conversationId": conversation_id, "limit": 2 }),
        )
        .await;
        let first_ids: Vec<_> = first["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(first_ids, vec![sent[2].clone(), sent[1].clone()]);
        assert_eq!(first["messages"][0]["readBy"], json!([b]));

        let cursor = &first["nextCursor"];
        let (_, second) = call(
            &service,
            "ListMessages",
            json!({
                "conversationId": conversation_id,
                "limit": 2,
                "beforeTimestamp": cursor["beforeTimestamp"],
                "beforeId": cursor["beforeId"],
            }),
        )
        .await;
        let second_ids: Vec<_> = second["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(second_ids, vec![sent[0].clone()]);
        assert!(second.get("nextCursor").is_none());
    }

    #[tokio::test]
    async fn get_conversation_reports_last_message() {
        let service = service();
        let a = participant();
        let conversation_id = conversation(&service, &[&a]).await;
        let (_, sent) = call(
            &service,
            "SendMessage",
            json!({ "conversationId": conversation_id, "senderId": a, "content": "latest" }),
        )
        .await;

        let (status, body) = call(
            &service,
            "GetConversation",
            json!({ "conversationId": conversation_id }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["lastMessage"], sent["messageId"]);
        assert_eq!(body["participants"], json!([a]));
    }

    #[tokio::test]
    async fn image_messages_go_through_register_image() {
        let service = service();
        let a = participant();
        let conversation_id = conversation(&service, &[&a]).await;

        let (status, image) = call(
            &service,
            "RegisterImage",
            json!({ "url": "https://cdn.example/x.png", "fileId": "ext-1" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(image["fileId"], "ext-1");

        let request = json!({ "conversationId": conversation_id, "senderId": a, "imageId": image["id"] });
        let (status, _) = call(&service, "SendMessage", request.clone()).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&service, "SendMessage", request).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "ATTACHMENT_IN_USE");
    }
}
