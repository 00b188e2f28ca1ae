//! Request/response envelopes between the content script and the background
//! service, and the framed JSON codec that carries them.

use qf_core::QfError;
use qf_core::QfResult;
use qf_storage::SavedItem;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024;
const HARD_MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;
const FRAME_PREFIX_BYTES: usize = 4;

/// Endpoint roles of the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    ContentScript,
    Background,
}

impl ChannelRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContentScript => "content-script",
            Self::Background => "background",
        }
    }

    pub fn from_role_name(value: &str) -> Option<Self> {
        match value {
            "content-script" => Some(Self::ContentScript),
            "background" => Some(Self::Background),
            _ => None,
        }
    }
}

/// Request envelope, routed by its `action` discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    GetEnabled,
    SetEnabled { enabled: bool },
    SaveItem { item: SavedItem },
    GetSavedItems,
    DeleteItem { id: String },
}

impl Request {
    pub fn action(&self) -> &'static str {
        match self {
            Self::GetEnabled => "getEnabled",
            Self::SetEnabled { .. } => "setEnabled",
            Self::SaveItem { .. } => "saveItem",
            Self::GetSavedItems => "getSavedItems",
            Self::DeleteItem { .. } => "deleteItem",
        }
    }
}

/// `{success, ...}` response envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<SavedItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn enabled(enabled: bool) -> Self {
        Self {
            success: true,
            enabled: Some(enabled),
            ..Self::default()
        }
    }

    pub fn items(items: Vec<SavedItem>) -> Self {
        Self {
            success: true,
            items: Some(items),
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Per-endpoint channel limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub role: ChannelRole,
    pub max_message_bytes: usize,
}

impl ChannelConfig {
    pub fn hardened(role: ChannelRole) -> QfResult<Self> {
        let config = Self {
            role,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> QfResult<()> {
        if self.max_message_bytes == 0 {
            return Err(QfError::new(
                "ipc.max_message_bytes_invalid",
                "channel max_message_bytes must be greater than zero",
            ));
        }

        if self.max_message_bytes > HARD_MAX_MESSAGE_BYTES {
            return Err(QfError::new(
                "ipc.max_message_bytes_too_large",
                "channel max_message_bytes exceeds hard limit (16 MiB)",
            ));
        }

        Ok(())
    }
}

/// The content script's only view of the background side.
pub trait ExtensionBridge {
    fn send(&mut self, request: &Request) -> QfResult<Response>;
}

/// Background-side request router.
pub trait MessageHandler {
    fn handle(&mut self, request: Request) -> Response;
}

/// In-process bridge that still pushes every message through the framed codec,
/// so size limits and encoding errors behave as they would across a real
/// channel.
#[derive(Debug)]
pub struct LocalBridge<H> {
    handler: H,
    content: ChannelConfig,
    background: ChannelConfig,
}

impl<H: MessageHandler> LocalBridge<H> {
    pub fn new(handler: H) -> QfResult<Self> {
        Ok(Self {
            handler,
            content: ChannelConfig::hardened(ChannelRole::ContentScript)?,
            background: ChannelConfig::hardened(ChannelRole::Background)?,
        })
    }

    pub fn with_configs(
        handler: H,
        content: ChannelConfig,
        background: ChannelConfig,
    ) -> QfResult<Self> {
        content.validate()?;
        background.validate()?;
        Ok(Self {
            handler,
            content,
            background,
        })
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }
}

impl<H: MessageHandler> ExtensionBridge for LocalBridge<H> {
    fn send(&mut self, request: &Request) -> QfResult<Response> {
        let frame = encode_request(request, self.content.max_message_bytes)?;
        let received = decode_request(&frame, self.background.max_message_bytes)?;
        debug!(
            action = received.action(),
            from = self.content.role.as_str(),
            bytes = frame.len(),
            "routing request"
        );

        let response = self.handler.handle(received);
        let frame = encode_response(&response, self.background.max_message_bytes)?;
        decode_response(&frame, self.content.max_message_bytes)
    }
}

/// Encodes a payload as a length-prefixed frame.
pub fn encode_frame(payload: &[u8], max_message_bytes: usize) -> QfResult<Vec<u8>> {
    if payload.len() > max_message_bytes {
        return Err(QfError::new(
            "ipc.message_too_large",
            format!(
                "payload exceeds max_message_bytes ({} > {})",
                payload.len(),
                max_message_bytes
            ),
        ));
    }

    let len_u32 = u32::try_from(payload.len()).map_err(|_| {
        QfError::new(
            "ipc.message_too_large",
            "payload length does not fit in 32-bit frame prefix",
        )
    })?;

    let mut out = Vec::with_capacity(FRAME_PREFIX_BYTES.saturating_add(payload.len()));
    out.extend_from_slice(&len_u32.to_be_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Decodes a length-prefixed frame and validates payload size.
pub fn decode_frame(frame: &[u8], max_message_bytes: usize) -> QfResult<&[u8]> {
    let Some((prefix, payload)) = frame.split_first_chunk::<FRAME_PREFIX_BYTES>() else {
        return Err(QfError::new(
            "ipc.frame_too_short",
            "frame is shorter than the 4-byte length prefix",
        ));
    };

    let payload_len = u32::from_be_bytes(*prefix) as usize;
    if payload_len > max_message_bytes {
        return Err(QfError::new(
            "ipc.message_too_large",
            format!("decoded payload exceeds max_message_bytes ({payload_len} > {max_message_bytes})"),
        ));
    }

    if payload.len() != payload_len {
        return Err(QfError::new(
            "ipc.frame_length_mismatch",
            format!(
                "frame length mismatch: prefix says {payload_len} bytes, got {}",
                payload.len()
            ),
        ));
    }

    Ok(payload)
}

pub fn encode_request(request: &Request, max_message_bytes: usize) -> QfResult<Vec<u8>> {
    encode_json(request, max_message_bytes)
}

pub fn decode_request(frame: &[u8], max_message_bytes: usize) -> QfResult<Request> {
    decode_json(frame, max_message_bytes)
}

pub fn encode_response(response: &Response, max_message_bytes: usize) -> QfResult<Vec<u8>> {
    encode_json(response, max_message_bytes)
}

pub fn decode_response(frame: &[u8], max_message_bytes: usize) -> QfResult<Response> {
    decode_json(frame, max_message_bytes)
}

fn encode_json<T: Serialize>(value: &T, max_message_bytes: usize) -> QfResult<Vec<u8>> {
    let payload = serde_json::to_vec(value).map_err(|error| {
        QfError::new(
            "ipc.message_encode_failed",
            format!("failed to encode message: {error}"),
        )
    })?;
    encode_frame(&payload, max_message_bytes)
}

fn decode_json<T: for<'de> Deserialize<'de>>(frame: &[u8], max_message_bytes: usize) -> QfResult<T> {
    let payload = decode_frame(frame, max_message_bytes)?;
    serde_json::from_slice(payload).map_err(|error| {
        QfError::new(
            "ipc.message_invalid",
            format!("failed to decode message: {error}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::ChannelConfig;
    use super::ChannelRole;
    use super::ExtensionBridge;
    use super::LocalBridge;
    use super::MessageHandler;
    use super::Request;
    use super::Response;
    use super::decode_frame;
    use super::decode_request;
    use super::encode_frame;
    use super::encode_response;
    use chrono::TimeZone;
    use chrono::Utc;
    use qf_storage::SavedItem;

    struct Echo {
        seen: Vec<&'static str>,
    }

    impl MessageHandler for Echo {
        fn handle(&mut self, request: Request) -> Response {
            self.seen.push(request.action());
            match request {
                Request::GetEnabled => Response::enabled(true),
                Request::SaveItem { item } => Response::items(vec![item]),
                _ => Response::failure("unsupported"),
            }
        }
    }

    fn sample_item() -> SavedItem {
        SavedItem {
            id: "abc".to_owned(),
            url: "https://www.youtube.com/shorts/abc".to_owned(),
            title: "A short".to_owned(),
            saved_at: Utc
                .timestamp_opt(1_700_000_000, 0)
                .single()
                .unwrap_or_else(|| unreachable!()),
        }
    }

    #[test]
    fn role_names_roundtrip() {
        assert_eq!(
            ChannelRole::from_role_name("background"),
            Some(ChannelRole::Background)
        );
        assert_eq!(ChannelRole::ContentScript.as_str(), "content-script");
        assert_eq!(ChannelRole::from_role_name("popup"), None);
    }

    #[test]
    fn requests_use_action_discriminator() {
        let frame = encode_frame(br#"{"action":"setEnabled","enabled":false}"#, 64)
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(
            decode_request(&frame, 64),
            Ok(Request::SetEnabled { enabled: false })
        );

        let frame = encode_frame(br#"{"action":"explode"}"#, 64).unwrap_or_else(|_| unreachable!());
        let decoded = decode_request(&frame, 64);
        assert!(decoded.is_err());
        if let Err(error) = decoded {
            assert_eq!(error.code, "ipc.message_invalid");
        }
    }

    #[test]
    fn responses_omit_absent_fields() {
        let frame = encode_response(&Response::enabled(false), 256).unwrap_or_else(|_| unreachable!());
        let payload = decode_frame(&frame, 256).unwrap_or_else(|_| unreachable!());
        assert_eq!(
            std::str::from_utf8(payload).unwrap_or_else(|_| unreachable!()),
            r#"{"success":true,"enabled":false}"#
        );
    }

    #[test]
    fn oversized_and_truncated_frames_are_rejected() {
        let oversized = encode_frame(&[b'x'; 65], 64);
        assert!(oversized.is_err());
        if let Err(error) = oversized {
            assert_eq!(error.code, "ipc.message_too_large");
        }

        let short = decode_frame(&[0, 0], 64);
        assert!(short.is_err());
        if let Err(error) = short {
            assert_eq!(error.code, "ipc.frame_too_short");
        }

        let mismatch = decode_frame(&[0, 0, 0, 5, b'a'], 64);
        assert!(mismatch.is_err());
        if let Err(error) = mismatch {
            assert_eq!(error.code, "ipc.frame_length_mismatch");
        }
    }

    #[test]
    fn local_bridge_routes_through_handler() {
        let mut bridge = LocalBridge::new(Echo { seen: Vec::new() }).unwrap_or_else(|_| unreachable!());

        assert_eq!(bridge.send(&Request::GetEnabled), Ok(Response::enabled(true)));
        assert_eq!(
            bridge.send(&Request::SaveItem { item: sample_item() }),
            Ok(Response::items(vec![sample_item()]))
        );
        assert_eq!(bridge.handler().seen, vec!["getEnabled", "saveItem"]);
    }

    #[test]
    fn local_bridge_enforces_size_limit() {
        let tiny = ChannelConfig {
            role: ChannelRole::ContentScript,
            max_message_bytes: 8,
        };
        let background = ChannelConfig::hardened(ChannelRole::Background).unwrap_or_else(|_| unreachable!());
        let mut bridge = LocalBridge::with_configs(Echo { seen: Vec::new() }, tiny, background)
            .unwrap_or_else(|_| unreachable!());

        let sent = bridge.send(&Request::GetSavedItems);
        assert!(sent.is_err());
        assert!(bridge.handler().seen.is_empty());
    }

    #[test]
    fn zero_sized_channel_is_invalid() {
        let config = ChannelConfig {
            role: ChannelRole::Background,
            max_message_bytes: 0,
        };
        assert!(config.validate().is_err());
    }
}
