use actix_web::{HttpResponse, Responder};
use serde::Serialize;

use super::error::Res;

pub struct Success;
impl Success {
    pub fn created<T: Serialize>(body: T) -> Res<impl Responder> {
        Result::Ok(HttpResponse::Created().json(body))
    }
    pub fn ok<T: Serialize>(body: T) -> Res<impl Responder> {
        Result::Ok(HttpResponse::Ok().json(body))
    }
    pub fn accepted<T: Serialize>(body: T) -> Res<impl Responder> {
        Result::Ok(HttpResponse::Accepted().json(body))
    }
}

/// Body shape shared by every successful API response.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn data(data: T) -> Self {
        Envelope {
            success: true,
            message: None,
            count: None,
            data: Some(data),
        }
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }
}

impl<U: Serialize> Envelope<Vec<U>> {
    pub fn list(items: Vec<U>) -> Self {
        Envelope {
            success: true,
            message: None,
            count: Some(items.len()),
            data: Some(items),
        }
    }
}

impl Envelope<()> {
    pub fn message(message: &str) -> Self {
        Envelope {
            success: true,
            message: Some(message.to_string()),
            count: None,
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_envelope_carries_count() {
        let body = serde_json::to_value(Envelope::list(vec![1, 2, 3])).unwrap();
        assert_eq!(body, json!({ "success": true, "count": 3, "data": [1, 2, 3] }));
    }

    #[test]
    fn message_envelope_has_no_data() {
        let body = serde_json::to_value(Envelope::message("done")).unwrap();
        assert_eq!(body, json!({ "success": true, "message": "done" }));
    }
}
