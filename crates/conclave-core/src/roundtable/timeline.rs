//! Append-only round-table timeline with response candidates.
//!
//! Messages are never removed or edited. The only mutations after append
//! are adding response candidates and selecting one of them.

use uuid::Uuid;

use conclave_types::error::RoundTableError;
use conclave_types::message::{Message, Response, SenderKind};

/// Ordered log of the messages of one round table.
#[derive(Debug, Clone)]
pub struct Timeline {
    round_table_id: Uuid,
    messages: Vec<Message>,
    next_sequence: u64,
}

impl Timeline {
    pub fn new(round_table_id: Uuid) -> Self {
        Self {
            round_table_id,
            messages: Vec::new(),
            next_sequence: 1,
        }
    }

    /// Rebuild a timeline from persisted messages.
    ///
    /// Messages are ordered by sequence; the next sequence continues after
    /// the highest one seen. At most one response per message stays
    /// selected (the last one flagged wins).
    pub fn from_messages(round_table_id: Uuid, mut messages: Vec<Message>) -> Self {
        messages.sort_by_key(|m| m.sequence);
        for message in &mut messages {
            if let Some(last) = message.responses.iter().rposition(|r| r.selected) {
                for (i, response) in message.responses.iter_mut().enumerate() {
                    response.selected = i == last;
                }
            }
        }
        let next_sequence = messages.last().map_or(1, |m| m.sequence + 1);
        Self {
            round_table_id,
            messages,
            next_sequence,
        }
    }

    pub fn round_table_id(&self) -> Uuid {
        self.round_table_id
    }

    /// Append a message, assigning the next sequence number.
    pub fn append(&mut self, mut message: Message) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        message.sequence = sequence;
        message.round_table_id = self.round_table_id;
        self.messages.push(message);
        sequence
    }

    /// Attach an unselected response candidate to a message.
    pub fn add_response(
        &mut self,
        message_id: &Uuid,
        mut response: Response,
    ) -> Result<Response, RoundTableError> {
        if &response.message_id != message_id {
            return Err(RoundTableError::ResponseMismatch {
                expected: *message_id,
                actual: response.message_id,
            });
        }
        let message = self
            .get_mut(message_id)
            .ok_or(RoundTableError::MessageNotFound(*message_id))?;
        response.selected = false;
        message.responses.push(response.clone());
        Ok(response)
    }

    /// Select exactly one response of a message, clearing any prior
    /// selection.
    pub fn select_response(
        &mut self,
        message_id: &Uuid,
        response_id: &Uuid,
    ) -> Result<(), RoundTableError> {
        let message = self
            .get_mut(message_id)
            .ok_or(RoundTableError::MessageNotFound(*message_id))?;
        if !message.responses.iter().any(|r| &r.id == response_id) {
            return Err(RoundTableError::ResponseNotFound(*response_id));
        }
        for response in &mut message.responses {
            response.selected = &response.id == response_id;
        }
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: &Uuid) -> Option<&Message> {
        self.messages.iter().rev().find(|m| &m.id == id)
    }

    fn get_mut(&mut self, id: &Uuid) -> Option<&mut Message> {
        self.messages.iter_mut().rev().find(|m| &m.id == id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recent user-originated message.
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.sender_kind == SenderKind::User)
    }

    /// The `n` most recent messages, oldest first.
    pub fn recent(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(table: Uuid, text: &str) -> Message {
        Message::user(table, "you", text, vec![])
    }

    #[test]
    fn append_assigns_increasing_sequence() {
        let table = Uuid::now_v7();
        let mut timeline = Timeline::new(table);
        assert_eq!(timeline.append(user(table, "one")), 1);
        assert_eq!(timeline.append(user(table, "two")), 2);
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.messages()[1].sequence, 2);
    }

    #[test]
    fn add_response_rejects_mismatched_message() {
        let table = Uuid::now_v7();
        let mut timeline = Timeline::new(table);
        let msg = user(table, "q");
        let msg_id = msg.id;
        timeline.append(msg);

        let stray = Response::new(Uuid::now_v7(), Uuid::now_v7(), "a");
        assert!(matches!(
            timeline.add_response(&msg_id, stray),
            Err(RoundTableError::ResponseMismatch { .. })
        ));
    }

    #[test]
    fn add_response_never_arrives_selected() {
        let table = Uuid::now_v7();
        let mut timeline = Timeline::new(table);
        let msg = user(table, "q");
        let msg_id = msg.id;
        timeline.append(msg);

        let mut pre_selected = Response::new(msg_id, Uuid::now_v7(), "a");
        pre_selected.selected = true;
        let added = timeline.add_response(&msg_id, pre_selected).unwrap();
        assert!(!added.selected);
    }

    #[test]
    fn select_response_keeps_at_most_one_selected() {
        let table = Uuid::now_v7();
        let author = Uuid::now_v7();
        let mut timeline = Timeline::new(table);
        let msg = user(table, "q");
        let msg_id = msg.id;
        timeline.append(msg);

        let first = timeline
            .add_response(&msg_id, Response::new(msg_id, author, "a"))
            .unwrap()
            .id;
        let second = timeline
            .add_response(&msg_id, Response::new(msg_id, author, "b"))
            .unwrap()
            .id;

        timeline.select_response(&msg_id, &first).unwrap();
        timeline.select_response(&msg_id, &second).unwrap();

        let msg = timeline.get(&msg_id).unwrap();
        let selected: Vec<&Response> = msg.responses.iter().filter(|r| r.selected).collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, second);
    }

    #[test]
    fn select_unknown_response_fails_without_clearing() {
        let table = Uuid::now_v7();
        let mut timeline = Timeline::new(table);
        let msg = user(table, "q");
        let msg_id = msg.id;
        timeline.append(msg);
        let chosen = timeline
            .add_response(&msg_id, Response::new(msg_id, Uuid::now_v7(), "a"))
            .unwrap()
            .id;
        timeline.select_response(&msg_id, &chosen).unwrap();

        assert!(matches!(
            timeline.select_response(&msg_id, &Uuid::now_v7()),
            Err(RoundTableError::ResponseNotFound(_))
        ));
        assert_eq!(timeline.get(&msg_id).unwrap().selected_response().unwrap().id, chosen);
        assert!(matches!(
            timeline.select_response(&Uuid::now_v7(), &chosen),
            Err(RoundTableError::MessageNotFound(_))
        ));
    }

    #[test]
    fn from_messages_sorts_and_continues_sequence() {
        let table = Uuid::now_v7();
        let mut a = user(table, "a");
        a.sequence = 2;
        let mut b = user(table, "b");
        b.sequence = 1;
        let mut timeline = Timeline::from_messages(table, vec![a, b]);

        assert_eq!(timeline.messages()[0].text, "b");
        assert_eq!(timeline.append(user(table, "c")), 3);
    }

    #[test]
    fn from_messages_normalizes_multiple_selections() {
        let table = Uuid::now_v7();
        let mut msg = user(table, "q");
        msg.sequence = 1;
        let mut r1 = Response::new(msg.id, Uuid::now_v7(), "a");
        r1.selected = true;
        let mut r2 = Response::new(msg.id, Uuid::now_v7(), "b");
        r2.selected = true;
        let r2_id = r2.id;
        msg.responses = vec![r1, r2];

        let timeline = Timeline::from_messages(table, vec![msg]);
        let restored = &timeline.messages()[0];
        assert_eq!(restored.responses.iter().filter(|r| r.selected).count(), 1);
        assert_eq!(restored.selected_response().unwrap().id, r2_id);
    }

    #[test]
    fn last_user_message_and_recent() {
        let table = Uuid::now_v7();
        let ada = Uuid::now_v7();
        let mut timeline = Timeline::new(table);
        timeline.append(user(table, "first"));
        timeline.append(user(table, "second"));
        timeline.append(Message::agent(table, ada, "Ada", "reply", vec![]));

        assert_eq!(timeline.last_user_message().unwrap().text, "second");
        let recent: Vec<&str> = timeline.recent(2).iter().map(|m| m.text.as_str()).collect();
        assert_eq!(recent, vec!["second", "reply"]);
        assert_eq!(timeline.recent(10).len(), 3);
    }
}
