//! AWS Lambda behind API Gateway.
//!
//! REST (payload 1.0) and HTTP API (payload 2.0) events are decoded with the
//! `aws_lambda_events` types and answered in the matching response shape.
//! The Lambda `awsRequestId` becomes the request's `x-correlation-id`, stamped on
//! both the event and the request so the logs and the client see the same id.

use aws_lambda_events::{
    apigw::{
        ApiGatewayProxyRequest, ApiGatewayProxyResponse, ApiGatewayV2httpRequest,
        ApiGatewayV2httpResponse,
    },
    encodings::Body as EventBody,
};
use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{HeaderMap, HeaderValue, Method, header},
};
use serde_json::{Map, Value, json};

use super::{ReplyParts, ServerlessError, read_body, write_body};
use crate::middleware::logger::CORRELATION_ID_HEADER;

/// API Gateway payload format of the incoming event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V1,
    V2,
}

pub(crate) fn request(event: &mut Value, context: &Value) -> Result<(Request, Version), ServerlessError> {
    if !event.is_object() {
        return Err(ServerlessError::InvalidEvent("expected an API Gateway event object".to_string()));
    }

    if let Some(request_id) = context.get("awsRequestId").and_then(Value::as_str) {
        stamp_correlation_id(event, request_id);
    }

    if event.get("version").and_then(Value::as_str) == Some("2.0") {
        let event: ApiGatewayV2httpRequest = serde_json::from_value(event.clone())?;
        Ok((from_http_api(event)?, Version::V2))
    } else {
        let event: ApiGatewayProxyRequest = serde_json::from_value(event.clone())?;
        Ok((from_rest(event)?, Version::V1))
    }
}

fn from_rest(event: ApiGatewayProxyRequest) -> Result<Request, ServerlessError> {
    let pairs = if event.multi_value_query_string_parameters.is_empty() {
        &event.query_string_parameters
    } else {
        &event.multi_value_query_string_parameters
    };
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs.iter() {
        serializer.append_pair(key, value);
    }
    let query = serializer.finish();

    let mut headers = event.multi_value_headers;
    for (name, value) in event.headers.iter() {
        if !headers.contains_key(name) {
            headers.append(name.clone(), value.clone());
        }
    }

    let body = read_body(event.body.map(Value::String).as_ref(), event.is_base64_encoded)?;
    let path = event.path.as_deref().unwrap_or("/");
    build(event.http_method, path, &query, headers, body)
}

/// HTTP API events keep `rawQueryString` verbatim; `queryStringParameters`
/// comma-joins repeated keys and is not used.
fn from_http_api(event: ApiGatewayV2httpRequest) -> Result<Request, ServerlessError> {
    let mut headers = event.headers;
    if let Some(cookies) = event.cookies.filter(|cookies| !cookies.is_empty()) {
        let value = HeaderValue::from_str(&cookies.join("; "))
            .map_err(|_| ServerlessError::InvalidEvent("cookies".to_string()))?;
        headers.insert(header::COOKIE, value);
    }

    let body = read_body(event.body.map(Value::String).as_ref(), event.is_base64_encoded)?;
    let path = event
        .raw_path
        .as_deref()
        .or(event.request_context.http.path.as_deref())
        .unwrap_or("/");
    let query = event.raw_query_string.as_deref().unwrap_or_default();
    build(event.request_context.http.method.clone(), path, query, headers, body)
}

fn build(method: Method, path: &str, query: &str, headers: HeaderMap, body: Bytes) -> Result<Request, ServerlessError> {
    let uri = if query.is_empty() {
        path.to_owned()
    } else {
        format!("{path}?{query}")
    };

    let mut request = axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::from(body))?;
    *request.headers_mut() = headers;
    Ok(request)
}

pub(crate) fn response(version: Version, reply: ReplyParts) -> Result<Value, ServerlessError> {
    let (body, is_base64_encoded) = write_body(&reply.headers, &reply.body);
    let status_code = i64::from(reply.status);

    let out = match version {
        Version::V1 => {
            let mut out = ApiGatewayProxyResponse::default();
            out.status_code = status_code;
            out.multi_value_headers = reply.headers.clone();
            out.headers = reply.headers;
            out.body = Some(EventBody::Text(body));
            out.is_base64_encoded = is_base64_encoded;
            serde_json::to_value(out)?
        }
        Version::V2 => {
            let mut headers = reply.headers;
            let cookies = headers
                .get_all(header::SET_COOKIE)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect();
            headers.remove(header::SET_COOKIE);

            let mut out = ApiGatewayV2httpResponse::default();
            out.status_code = status_code;
            out.headers = headers;
            out.cookies = cookies;
            out.body = Some(EventBody::Text(body));
            out.is_base64_encoded = is_base64_encoded;
            serde_json::to_value(out)?
        }
    };
    Ok(out)
}

fn stamp_correlation_id(event: &mut Value, request_id: &str) {
    let Some(object) = event.as_object_mut() else {
        return;
    };

    let headers = object
        .entry("headers")
        .or_insert_with(|| Value::Object(Map::new()));
    if !headers.is_object() {
        *headers = Value::Object(Map::new());
    }
    if let Some(headers) = headers.as_object_mut() {
        headers.retain(|name, _| !name.eq_ignore_ascii_case(CORRELATION_ID_HEADER));
        headers.insert(CORRELATION_ID_HEADER.to_string(), Value::String(request_id.to_string()));
    }

    if let Some(Value::Object(multi)) = object.get_mut("multiValueHeaders") {
        multi.retain(|name, _| !name.eq_ignore_ascii_case(CORRELATION_ID_HEADER));
        multi.insert(CORRELATION_ID_HEADER.to_string(), json!([request_id]));
    }
}
