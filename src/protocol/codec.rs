/// Line codec for packets.
/// Every packet is one JSON object terminated by `\n`; end of stream is reported as `Ok(None)`.
use super::packet::Packet;
use crate::error::{Result, ServerError};
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Encode a packet as a single newline-terminated line.
pub fn encode(packet: &Packet) -> Result<String> {
    let mut line = serde_json::to_string(packet).map_err(|e| {
        ServerError::MalformedPacket(format!("cannot encode {}: {}", packet.kind(), e))
    })?;
    // serde_json escapes control characters inside strings
    debug_assert!(!line.contains('\n'));
    line.push('\n');
    Ok(line)
}

/// Decode one line (with or without its terminator) into a packet.
pub fn decode(line: &str) -> Result<Packet> {
    let body = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
    let packet: Packet =
        serde_json::from_str(body).map_err(|e| ServerError::MalformedPacket(e.to_string()))?;
    packet.validate().map_err(ServerError::MalformedPacket)?;
    Ok(packet)
}

/// Read the next packet from a buffered stream.
///
/// Returns `Ok(None)` once the peer has closed the stream. A trailing line
/// without a terminator is an interrupted write and is discarded the same way.
/// Blank lines are skipped.
pub async fn read_packet<R>(reader: &mut R) -> Result<Option<Packet>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader.read_line(&mut line).await.map_err(|e| {
            if e.kind() == io::ErrorKind::InvalidData {
                ServerError::MalformedPacket("packet is not valid UTF-8".to_string())
            } else {
                ServerError::Transport(e)
            }
        })?;

        if read == 0 {
            return Ok(None);
        }
        if !line.ends_with('\n') {
            log::debug!("Discarding {} bytes of unterminated input", line.len());
            return Ok(None);
        }
        if line.trim().is_empty() {
            continue;
        }
        return decode(&line).map(Some);
    }
}

/// Encode and write one packet, flushing the writer.
pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let line = encode(packet)?;
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use crate::models::{ChatRoom, Message};
    use tokio::io::BufReader;

    fn canonical_lines() -> Vec<String> {
        vec![
            r#"{"type":"REGISTER","user":{"username":"alice","password":"secret1"}}"#,
            r#"{"type":"REGISTER_SUCCESS"}"#,
            r#"{"type":"REGISTER_FAILED","info":"Username Already Exist"}"#,
            r#"{"type":"LOGIN","user":{"username":"alice","password":"secret1"}}"#,
            r#"{"type":"LOGIN_SUCCESS"}"#,
            r#"{"type":"LOGIN_FAILED","info":"User Already Login"}"#,
            r#"{"type":"NEW_USER","user":{"username":"bob"}}"#,
            r#"{"type":"LOGOUT","user":{"username":"bob"}}"#,
            r#"{"type":"CREATE_CHAT","user":{"username":"alice"},"chatRoom":{"id":"4f1c","type":"GROUP","users":["alice","bob","carol"],"unreadCount":0}}"#,
            r#"{"type":"CREATE_CHAT","user":{"username":"carol"},"chatRoom":{"id":"9e2a","type":"GROUP","users":["carol","alice","bob"]}}"#,
            r#"{"type":"CREATE_CHAT","user":{"username":"bob"},"chatRoom":{"id":"77b0","type":"PRIVATE","users":["bob","alice"],"unreadCount":-1}}"#,
            r#"{"type":"MESSAGE","message":{"chatRoomId":"4f1c","timestamp":1700000000000,"sentBy":"alice","data":"hi","type":"TEXT"}}"#,
            r#"{"type":"MESSAGE","message":{"chatRoomId":"4f1c","timestamp":1700000000001,"sentBy":"bob","data":"AAEC","type":"FILE","fileName":"a.bin"}}"#,
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    #[test]
    fn test_encode_decode_preserves_every_variant() {
        for line in canonical_lines() {
            let packet = decode(&line).expect("canonical line should decode");
            let encoded = encode(&packet).expect("packet should encode");
            assert_eq!(encoded, format!("{}\n", line));
        }
    }

    #[test]
    fn test_decode_accepts_negative_unread_count() {
        let line = r#"{"type":"CREATE_CHAT","user":{"username":"alice"},"chatRoom":{"id":"p","type":"PRIVATE","users":["alice","bob"],"unreadCount":-1}}"#;
        match decode(line) {
            Ok(Packet::CreateChat { chat_room, .. }) => {
                assert_eq!(chat_room.unread_count, Some(-1));
                assert_eq!(chat_room.users, vec!["alice", "bob"]);
            }
            other => panic!("expected CREATE_CHAT, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_escapes_newlines() {
        let packet = Packet::message(Message::text("r1", "alice", "two\nlines"));
        let line = encode(&packet).unwrap();
        assert_eq!(line.matches('\n').count(), 1);
        assert!(line.ends_with('\n'));
        assert_eq!(decode(&line).unwrap(), packet);
    }

    #[test]
    fn test_decode_accepts_crlf() {
        let packet = decode("{\"type\":\"LOGIN_SUCCESS\"}\r\n").unwrap();
        assert_eq!(packet, Packet::login_success());
    }

    #[test]
    fn test_decode_rejects_malformed_input() {
        for bad in [
            "not json",
            r#"{"user":{"username":"alice"}}"#,
            r#"{"type":"TELEPORT"}"#,
            r#"{"type":"NEW_USER"}"#,
            r#"{"type":"MESSAGE","message":{"chatRoomId":"r","timestamp":1,"sentBy":"a","data":"x","type":"FILE"}}"#,
            r#"{"type":"MESSAGE","message":{"chatRoomId":"r","timestamp":1,"sentBy":"a","data":"x","type":"TEXT","fileName":"f"}}"#,
        ] {
            match decode(bad) {
                Err(ServerError::MalformedPacket(_)) => {}
                other => panic!("expected MalformedPacket for {}, got {:?}", bad, other),
            }
        }
    }

    #[tokio::test]
    async fn test_read_packet_sequence_then_eof() {
        let input = format!(
            "{}\n\n{}",
            encode(&Packet::login("alice", "pw")).unwrap().trim_end(),
            encode(&Packet::logout("alice")).unwrap()
        );
        let mut reader = BufReader::new(input.as_bytes());

        assert_eq!(
            read_packet(&mut reader).await.unwrap(),
            Some(Packet::login("alice", "pw"))
        );
        assert_eq!(
            read_packet(&mut reader).await.unwrap(),
            Some(Packet::logout("alice"))
        );
        assert_eq!(read_packet(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_packet_discards_partial_line() {
        let mut reader = BufReader::new(&br#"{"type":"LOGIN_SUCC"#[..]);
        assert_eq!(read_packet(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_packet_reports_malformed_line() {
        let mut reader = BufReader::new(&b"{broken\n"[..]);
        assert!(matches!(
            read_packet(&mut reader).await,
            Err(ServerError::MalformedPacket(_))
        ));
    }

    #[tokio::test]
    async fn test_write_packet_emits_one_line() {
        let mut out: Vec<u8> = Vec::new();
        let room = ChatRoom::private("r1", "alice", "bob");
        write_packet(&mut out, &Packet::create_chat("alice", room))
            .await
            .unwrap();
        write_packet(&mut out, &Packet::login_failed(&AuthError::BadCredentials))
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(matches!(decode(lines[0]).unwrap(), Packet::CreateChat { .. }));
    }
}
