use super::*;
use shared::domain::{ChannelInfo, ChannelKind};

fn text(id: u64, name: &str, position: i32) -> ChannelInfo {
    ChannelInfo {
        id: ChannelId(id),
        name: name.to_string(),
        kind: ChannelKind::Text,
        position,
    }
}

fn server_a() -> Server {
    Server::new(ServerId(1), "A")
        .with_channel(text(11, "random", 1))
        .with_channel(ChannelInfo {
            id: ChannelId(12),
            name: "voice".to_string(),
            kind: ChannelKind::Voice,
            position: 0,
        })
        .with_channel(text(10, "general", 0))
}

fn message(id: u64, channel: u64, author: &str, content: &str) -> Message {
    Message {
        id: MessageId(id),
        channel_id: ChannelId(channel),
        author_name: author.to_string(),
        author_avatar_url: String::new(),
        content: content.to_string(),
    }
}

fn server_ids(collections: &ChatCollections) -> Vec<u64> {
    collections.servers().iter().map(|server| server.id.0).collect()
}

#[test]
fn add_and_remove_keep_first_add_order() {
    let mut collections = ChatCollections::new();
    for id in [3, 1, 2] {
        collections.add_server(Server::new(ServerId(id), format!("s{id}")));
    }
    collections.add_server(Server::new(ServerId(1), "renamed"));
    assert_eq!(server_ids(&collections), vec![3, 1, 2]);
    assert_eq!(collections.servers()[1].name, "renamed");

    assert!(collections.remove_server(ServerId(3)).is_some());
    assert!(collections.remove_server(ServerId(42)).is_none());
    collections.add_server(Server::new(ServerId(3), "back"));
    assert_eq!(server_ids(&collections), vec![1, 2, 3]);
}

#[test]
fn server_list_matches_added_minus_removed_for_mixed_sequences() {
    // Deterministic pseudo-random walk over add/remove operations checked
    // against a simple model.
    let mut seed: u64 = 0x5eed;
    let mut next = move || {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        seed >> 33
    };

    let mut collections = ChatCollections::new();
    let mut model: Vec<u64> = Vec::new();
    for _ in 0..500 {
        let id = next() % 12;
        if next() % 3 == 0 {
            collections.remove_server(ServerId(id));
            model.retain(|existing| *existing != id);
        } else {
            collections.add_server(Server::new(ServerId(id), format!("s{id}")));
            if !model.contains(&id) {
                model.push(id);
            }
        }
        assert_eq!(server_ids(&collections), model);
    }
}

#[test]
fn selecting_server_rebuilds_text_channels_and_resets_selection() {
    let mut collections = ChatCollections::new();
    collections.add_server(server_a());
    collections.select_server_by_id(ServerId(1)).expect("select A");
    collections
        .select_channel_by_id(ChannelId(10))
        .expect("select general");
    assert!(collections.append_message(message(1, 10, "alice", "hi")));

    collections.select_server_by_id(ServerId(1)).expect("reselect A");
    let names: Vec<String> = collections
        .channels()
        .iter()
        .map(|channel| channel.to_string())
        .collect();
    assert_eq!(names, vec!["#general", "#random"]);
    assert!(collections.selection().channel().is_none());
    assert!(collections.selection().message().is_none());
    assert!(collections.messages().is_empty());

    collections.select_server(None);
    assert!(collections.channels().is_empty());
    assert!(collections.selection().is_empty());
}

#[test]
fn selecting_channel_clears_messages() {
    let mut collections = ChatCollections::new();
    collections.add_server(server_a());
    collections.select_server_by_id(ServerId(1)).expect("select A");
    collections.select_channel_by_id(ChannelId(10)).expect("general");
    assert!(collections.append_message(message(1, 10, "alice", "hi")));
    assert!(collections.append_message(message(2, 10, "bob", "hey")));

    collections.select_channel_by_id(ChannelId(11)).expect("random");
    assert!(collections.messages().is_empty());
    assert!(collections.selection().message().is_none());

    // Switching back does not replay history.
    collections.select_channel_by_id(ChannelId(10)).expect("general");
    assert!(collections.messages().is_empty());
}

#[test]
fn channel_selection_requires_a_listed_channel_of_the_selected_server() {
    let mut collections = ChatCollections::new();
    collections.add_server(server_a());
    assert_eq!(
        collections.select_channel_by_id(ChannelId(10)),
        Err(SelectionError::NoServerSelected(ChannelId(10)))
    );

    collections.select_server_by_id(ServerId(1)).expect("select A");
    assert_eq!(
        collections.select_channel_by_id(ChannelId(12)),
        Err(SelectionError::UnknownChannel(ChannelId(12)))
    );
    assert_eq!(
        collections.select_server_by_id(ServerId(9)),
        Err(SelectionError::UnknownServer(ServerId(9)))
    );
}

#[test]
fn append_only_accepts_selected_channel() {
    let mut collections = ChatCollections::new();
    assert!(!collections.append_message(message(1, 10, "alice", "nobody listening")));

    collections.add_server(server_a());
    collections.select_server_by_id(ServerId(1)).expect("select A");
    collections.select_channel_by_id(ChannelId(10)).expect("general");

    let before = collections.revision();
    assert!(!collections.append_message(message(2, 11, "bob", "elsewhere")));
    assert_eq!(collections.revision(), before);
    assert!(collections.messages().is_empty());

    assert!(collections.append_message(message(3, 10, "alice", "hi")));
    assert_eq!(collections.messages().len(), 1);
    assert_eq!(
        collections.selection().message().map(|m| m.id),
        Some(MessageId(3))
    );
}

#[test]
fn delivery_is_invariant_under_interleaving_of_unrelated_messages() {
    let relevant: Vec<Message> = (0..5)
        .map(|n| message(100 + n, 10, "alice", &format!("m{n}")))
        .collect();
    let unrelated: Vec<Message> = (0..4)
        .map(|n| message(200 + n, 11 + n % 2, "bob", &format!("u{n}")))
        .collect();

    for offset in 0..=relevant.len() {
        for stride in 1..=3 {
            let mut stream = relevant.clone();
            for (n, noise) in unrelated.iter().enumerate() {
                let at = (offset + n * stride).min(stream.len());
                stream.insert(at, noise.clone());
            }

            let mut collections = ChatCollections::new();
            collections.add_server(server_a());
            collections.select_server_by_id(ServerId(1)).expect("select A");
            collections.select_channel_by_id(ChannelId(10)).expect("general");
            for item in stream {
                collections.append_message(item);
            }

            let delivered: Vec<MessageId> =
                collections.messages().iter().map(|m| m.id).collect();
            let expected: Vec<MessageId> = relevant.iter().map(|m| m.id).collect();
            assert_eq!(delivered, expected, "offset {offset} stride {stride}");
        }
    }
}

#[test]
fn message_selection_must_reference_listed_message() {
    let mut collections = ChatCollections::new();
    collections.add_server(server_a());
    collections.select_server_by_id(ServerId(1)).expect("select A");
    collections.select_channel_by_id(ChannelId(10)).expect("general");
    collections.append_message(message(1, 10, "alice", "first"));
    collections.append_message(message(2, 10, "alice", "second"));

    collections
        .select_message_by_id(MessageId(1))
        .expect("select first");
    assert_eq!(
        collections.selection().message().map(|m| m.id),
        Some(MessageId(1))
    );
    assert_eq!(
        collections.select_message_by_id(MessageId(7)),
        Err(SelectionError::UnknownMessage(MessageId(7)))
    );
    collections.select_message(None).expect("clear");
    assert!(collections.selection().message().is_none());
}

#[test]
fn removing_selected_server_clears_selection() {
    let mut collections = ChatCollections::new();
    collections.add_server(server_a());
    collections.add_server(Server::new(ServerId(2), "B"));
    collections.select_server_by_id(ServerId(1)).expect("select A");
    collections.select_channel_by_id(ChannelId(10)).expect("general");

    collections.remove_server(ServerId(2));
    assert!(collections.selection().channel().is_some());

    collections.remove_server(ServerId(1));
    assert!(collections.selection().is_empty());
    assert!(collections.channels().is_empty());
}

#[test]
fn reset_empties_everything() {
    let mut collections = ChatCollections::new();
    collections.add_server(server_a());
    collections.select_server_by_id(ServerId(1)).expect("select A");
    collections.select_channel_by_id(ChannelId(10)).expect("general");
    collections.append_message(message(1, 10, "alice", "hi"));

    collections.reset();
    assert!(collections.servers().is_empty());
    assert!(collections.channels().is_empty());
    assert!(collections.messages().is_empty());
    assert!(collections.selection().is_empty());
}
