//! Persisted/wire shapes: the message record and the tagged attachment
//! union as they appear in JSON.

use chrono::{TimeZone, Utc};
use courier_service::models::message::{
    Attachment, CallInvitation, CallType, FileAttachment, InvitationStatus, Message,
};
use uuid::Uuid;

fn file(name: &str, url: &str) -> Attachment {
    Attachment::File(FileAttachment {
        name: name.into(),
        url: url.into(),
        mime_type: "image/png".into(),
        size_bytes: 2048,
    })
}

#[test]
fn message_record_shape() {
    let message = Message {
        id: Uuid::new_v4(),
        sender_id: Uuid::new_v4(),
        recipient_id: Uuid::new_v4(),
        job_id: None,
        body: "see attached".into(),
        attachments: vec![
            file("a.png", "https://cdn.example.com/a.png"),
            file("b.png", "https://cdn.example.com/b.png"),
        ],
        created_at: Utc.with_ymd_and_hms(2026, 7, 1, 8, 0, 0).unwrap(),
        edited_at: None,
        is_read: false,
        reply_to: None,
    };

    let json = serde_json::to_value(&message).unwrap();
    assert_eq!(json["job_id"], serde_json::Value::Null);
    assert_eq!(json["edited_at"], serde_json::Value::Null);
    assert_eq!(json["is_read"], false);

    // Two file entries with their durable URLs survive the round trip.
    let attachments = json["attachments"].as_array().unwrap();
    assert_eq!(attachments.len(), 2);
    assert!(attachments
        .iter()
        .all(|a| a["kind"] == "file" && a["url"].as_str().unwrap().starts_with("https://")));

    let back: Message = serde_json::from_value(json).unwrap();
    assert_eq!(back.attachments, message.attachments);
}

#[test]
fn attachment_union_discriminates_on_kind() {
    let invitation = Attachment::CallInvitation(CallInvitation {
        call_type: CallType::Scheduled,
        status: InvitationStatus::CounterProposed,
        scheduled_at: Some(Utc.with_ymd_and_hms(2026, 7, 2, 15, 0, 0).unwrap()),
        is_counter_proposal: true,
    });

    let json = serde_json::to_value(&invitation).unwrap();
    assert_eq!(json["kind"], "call_invitation");
    assert_eq!(json["call_type"], "scheduled");
    assert_eq!(json["status"], "counter_proposed");
    assert_eq!(json["is_counter_proposal"], true);

    let back: Attachment = serde_json::from_value(json).unwrap();
    assert_eq!(back, invitation);
}

#[test]
fn unknown_attachment_kind_is_rejected() {
    let raw = serde_json::json!({ "kind": "sticker", "name": "wave" });
    assert!(serde_json::from_value::<Attachment>(raw).is_err());
}

#[test]
fn missing_kind_tag_is_rejected() {
    let raw = serde_json::json!({
        "name": "a.png",
        "url": "https://cdn.example.com/a.png",
        "mime_type": "image/png",
        "size_bytes": 2048
    });
    assert!(serde_json::from_value::<Attachment>(raw).is_err());
}
