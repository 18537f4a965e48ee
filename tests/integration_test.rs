// End-to-end tests driving a live server socket with the crate's own
// handshake and chunk codec.

mod common;

use std::sync::Arc;
use std::time::Duration;

use rtmpd::{
    make_audio_packet, make_video_packet, RtmpServer, ServerConfig, UserControlEvent,
    MSG_TYPE_SET_CHUNK_SIZE, MSG_TYPE_SET_PEER_BW, MSG_TYPE_USER_CONTROL, MSG_TYPE_WINDOW_ACK,
};

use common::*;

async fn start_server(config: ServerConfig) -> Arc<RtmpServer> {
    let server = Arc::new(RtmpServer::new(config));
    let listener = server.clone();
    tokio::spawn(async move {
        let _ = listener.listen().await;
    });
    tokio::time::sleep(Duration::from_millis(200)).await;
    server
}

fn test_config(port: u16) -> ServerConfig {
    ServerConfig::builder()
        .host("127.0.0.1")
        .port(port)
        .chunk_size(4096)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_connect_negotiation_sequence() {
    let server = start_server(test_config(19401)).await;
    let mut client = TestClient::connect(19401).await;

    client.send_command(0, &connect_command("live")).await;

    // Window ack size 2_500_000
    let packet = client.recv_message().await;
    assert_eq!(packet.message_type(), MSG_TYPE_WINDOW_ACK);
    assert_eq!(packet.payload, 2_500_000u32.to_be_bytes().to_vec());

    // Peer bandwidth 2_500_000, dynamic limit
    let packet = client.recv_message().await;
    assert_eq!(packet.message_type(), MSG_TYPE_SET_PEER_BW);
    assert_eq!(&packet.payload[..4], &2_500_000u32.to_be_bytes());
    assert_eq!(packet.payload[4], 2);

    // StreamBegin(0)
    let packet = client.recv_message().await;
    assert_eq!(packet.message_type(), MSG_TYPE_USER_CONTROL);
    assert_eq!(
        UserControlEvent::decode(&packet.payload).unwrap(),
        UserControlEvent::StreamBegin(0)
    );

    // Chunk size 4096
    let packet = client.recv_message().await;
    assert_eq!(packet.message_type(), MSG_TYPE_SET_CHUNK_SIZE);
    assert_eq!(packet.payload, 4096u32.to_be_bytes().to_vec());

    // _result with success code and negotiated encoding
    let command = client.recv_command().await;
    assert_eq!(command.name, "_result");
    let info = command.argument(0).unwrap();
    assert_eq!(
        info.get_property("code").and_then(|v| v.as_string()),
        Some("NetConnection.Connect.Success")
    );
    assert_eq!(
        info.get_property("objectEncoding").and_then(|v| v.as_number()),
        Some(0.0)
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_publish_then_play_relays_frames() {
    let server = start_server(test_config(19402)).await;

    // Publisher brings up its stream
    let mut publisher = TestClient::connect(19402).await;
    publisher.connect_app("live").await;
    let publish_id = publisher.create_stream().await;
    assert_eq!(publish_id, 1);

    publisher
        .send_command(publish_id, &publish_command("cam", "live"))
        .await;
    assert_eq!(
        publisher.next_status_code().await,
        "NetStream.Publish.Start"
    );

    // Player joins
    let mut player = TestClient::connect(19402).await;
    player.connect_app("live").await;
    let play_id = player.create_stream().await;
    assert_eq!(play_id, 1);

    player
        .send_command(play_id, &play_command("cam", -1.0, -1.0, true))
        .await;
    assert_eq!(player.next_status_code().await, "NetStream.Play.Reset");
    assert_eq!(player.next_status_code().await, "NetStream.Play.Start");

    // Give the subscription a moment to attach before media flows
    tokio::time::sleep(Duration::from_millis(200)).await;

    publisher
        .send_packet(&make_video_packet(avc_config_payload(), 0, publish_id))
        .await;
    publisher
        .send_packet(&make_audio_packet(aac_config_payload(), 0, publish_id))
        .await;
    publisher
        .send_packet(&make_video_packet(avc_keyframe_payload(), 40, publish_id))
        .await;

    // Both configs arrive, then the keyframe with its timestamp preserved
    let first = player.recv_media().await;
    assert!(first.is_video());
    assert_eq!(first.payload, avc_config_payload());

    let second = player.recv_media().await;
    assert!(second.is_audio());
    assert_eq!(second.payload, aac_config_payload());

    let third = player.recv_media().await;
    assert!(third.is_video());
    assert_eq!(third.timestamp(), 40);
    assert_eq!(third.message_stream_id(), play_id);
    assert_eq!(third.payload, avc_keyframe_payload());

    server.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_publish_rejected() {
    let server = start_server(test_config(19403)).await;

    let mut first = TestClient::connect(19403).await;
    first.connect_app("live").await;
    let first_id = first.create_stream().await;
    first
        .send_command(first_id, &publish_command("cam", "live"))
        .await;
    assert_eq!(first.next_status_code().await, "NetStream.Publish.Start");

    // A second publisher on the same name is refused
    let mut second = TestClient::connect(19403).await;
    second.connect_app("live").await;
    let second_id = second.create_stream().await;
    second
        .send_command(second_id, &publish_command("cam", "live"))
        .await;
    assert_eq!(
        second.next_status_code().await,
        "NetStream.Publish.BadName"
    );

    // The original publisher is unaffected; a player still attaches
    let mut player = TestClient::connect(19403).await;
    player.connect_app("live").await;
    let play_id = player.create_stream().await;
    player
        .send_command(play_id, &play_command("cam", -1.0, -1.0, false))
        .await;
    assert_eq!(player.next_status_code().await, "NetStream.Play.Start");

    server.shutdown().await;
}

#[tokio::test]
async fn test_read_access_enforced_per_app() {
    let config = ServerConfig::builder()
        .host("127.0.0.1")
        .port(19404)
        .chunk_size(4096)
        .read_access("/live")
        .build()
        .unwrap();
    let server = start_server(config).await;

    // Under the readable app, stream setup succeeds
    let mut allowed = TestClient::connect(19404).await;
    allowed.connect_app("live").await;
    let stream_id = allowed.create_stream().await;
    assert_eq!(stream_id, 1);

    // Under any other app, stream setup is refused with a play failure
    let mut denied = TestClient::connect(19404).await;
    denied.connect_app("vod").await;

    let mut command = rtmpd::RtmpCommand::new("createStream", 4.0);
    command.command_object = Some(rtmpd::Amf0Value::Null);
    denied.send_command(0, &command).await;

    let reply = denied.recv_command().await;
    assert_eq!(reply.name, "_error");
    assert_eq!(
        reply
            .argument(0)
            .and_then(|v| v.get_property("code"))
            .and_then(|v| v.as_string()),
        Some("NetStream.Play.Failed")
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_unpublish_notifies_players() {
    let server = start_server(test_config(19405)).await;

    let mut publisher = TestClient::connect(19405).await;
    publisher.connect_app("live").await;
    let publish_id = publisher.create_stream().await;
    publisher
        .send_command(publish_id, &publish_command("cam", "live"))
        .await;
    assert_eq!(
        publisher.next_status_code().await,
        "NetStream.Publish.Start"
    );

    let mut player = TestClient::connect(19405).await;
    player.connect_app("live").await;
    let play_id = player.create_stream().await;
    player
        .send_command(play_id, &play_command("cam", -1.0, -1.0, false))
        .await;
    assert_eq!(player.next_status_code().await, "NetStream.Play.Start");
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Publisher tears its stream down
    publisher
        .send_command(publish_id, &rtmpd::RtmpCommand::new("closeStream", 0.0))
        .await;

    assert_eq!(
        player.next_status_code().await,
        "NetStream.Play.UnpublishNotify"
    );

    server.shutdown().await;
}
