//! Ordered server/channel/message collections and the selection that ties
//! them together.

use shared::domain::{Channel, ChannelId, Message, MessageId, Server, ServerId};

use crate::error::SelectionError;

/// The focused server, channel and message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    server: Option<Server>,
    channel: Option<Channel>,
    message: Option<Message>,
}

impl Selection {
    pub fn server(&self) -> Option<&Server> {
        self.server.as_ref()
    }

    pub fn channel(&self) -> Option<&Channel> {
        self.channel.as_ref()
    }

    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.server.is_none() && self.channel.is_none() && self.message.is_none()
    }
}

#[derive(Debug, Default)]
pub struct ChatCollections {
    servers: Vec<Server>,
    channels: Vec<Channel>,
    messages: Vec<Message>,
    selection: Selection,
    revision: u64,
}

impl ChatCollections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Bumped on every change; renderers compare it to skip redundant work.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn find_server(&self, id: ServerId) -> Option<&Server> {
        self.servers.iter().find(|server| server.id == id)
    }

    pub fn select_server(&mut self, server: Option<Server>) {
        self.channels = server
            .as_ref()
            .map(Server::text_channels)
            .unwrap_or_default();
        self.messages.clear();
        self.selection = Selection {
            server,
            channel: None,
            message: None,
        };
        self.touch();
    }

    pub fn select_server_by_id(&mut self, id: ServerId) -> Result<(), SelectionError> {
        let server = self
            .find_server(id)
            .cloned()
            .ok_or(SelectionError::UnknownServer(id))?;
        self.select_server(Some(server));
        Ok(())
    }

    pub fn select_channel(&mut self, channel: Option<Channel>) -> Result<(), SelectionError> {
        if let Some(channel) = &channel {
            if self.selection.server.is_none() {
                return Err(SelectionError::NoServerSelected(channel.id));
            }
            if !self.channels.contains(channel) {
                return Err(SelectionError::UnknownChannel(channel.id));
            }
        }
        self.selection.channel = channel;
        self.selection.message = None;
        self.messages.clear();
        self.touch();
        Ok(())
    }

    pub fn select_channel_by_id(&mut self, id: ChannelId) -> Result<(), SelectionError> {
        if self.selection.server.is_none() {
            return Err(SelectionError::NoServerSelected(id));
        }
        let channel = self
            .channels
            .iter()
            .find(|channel| channel.id == id)
            .cloned()
            .ok_or(SelectionError::UnknownChannel(id))?;
        self.select_channel(Some(channel))
    }

    pub fn select_message(&mut self, message: Option<Message>) -> Result<(), SelectionError> {
        if let Some(message) = &message {
            if !self.messages.contains(message) {
                return Err(SelectionError::UnknownMessage(message.id));
            }
        }
        self.selection.message = message;
        self.touch();
        Ok(())
    }

    pub fn select_message_by_id(&mut self, id: MessageId) -> Result<(), SelectionError> {
        let message = self
            .messages
            .iter()
            .find(|message| message.id == id)
            .cloned()
            .ok_or(SelectionError::UnknownMessage(id))?;
        self.select_message(Some(message))
    }

    /// Appends a server, or replaces the entry with the same id in place.
    pub fn add_server(&mut self, server: Server) {
        match self.servers.iter_mut().find(|existing| existing.id == server.id) {
            Some(existing) => {
                if self.selection.server.as_ref() == Some(&server) {
                    self.selection.server = Some(server.clone());
                }
                *existing = server;
            }
            None => self.servers.push(server),
        }
        self.touch();
    }

    /// Removes the first server with `id`. Removing the selected server
    /// clears the selection along with the channel and message lists.
    pub fn remove_server(&mut self, id: ServerId) -> Option<Server> {
        let index = self.servers.iter().position(|server| server.id == id)?;
        let removed = self.servers.remove(index);
        if self.selection.server.as_ref() == Some(&removed) {
            self.select_server(None);
        } else {
            self.touch();
        }
        Some(removed)
    }

    /// Appends `message` if it belongs to the selected channel and makes it
    /// the selected message. Returns whether the message list changed.
    pub fn append_message(&mut self, message: Message) -> bool {
        let Some(channel) = &self.selection.channel else {
            return false;
        };
        if channel.id != message.channel_id {
            return false;
        }
        self.selection.message = Some(message.clone());
        self.messages.push(message);
        self.touch();
        true
    }

    pub fn reset(&mut self) {
        self.servers.clear();
        self.channels.clear();
        self.messages.clear();
        self.selection = Selection::default();
        self.touch();
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

#[cfg(test)]
#[path = "tests/collections_tests.rs"]
mod tests;
