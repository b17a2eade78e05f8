use serde::de::DeserializeOwned;

/// Event received from the subscription stream.
///
/// Fields are forwarded as sent by the server; decoding `data` into an
/// application type is up to the consumer (see [`Event::json`]).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    /// Value of the last `id:` field of the event
    pub id: Option<String>,
    /// Value of the last `event:` field of the event
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: Vec<u8>,
    /// Reconnection time in milliseconds suggested by the server
    pub retry: Option<u64>,
}

impl Event {
    pub(crate) fn has_content(&self) -> bool {
        self.id.is_some() || self.event.is_some() || !self.data.is_empty() || self.retry.is_some()
    }

    /// Decodes the event payload as JSON.
    ///
    /// ```rust
    /// use centrifuge_sse::events::Event;
    /// use centrifuge_sse::protocol::EventData;
    ///
    /// let event = Event {
    ///     data: br#"{"channel":"news","pub":{"data":{"n":1}}}"#.to_vec(),
    ///     ..Default::default()
    /// };
    /// let data: EventData = event.json().unwrap();
    /// assert_eq!(data.channel, "news");
    /// ```
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        crate::utils::deserialize(&self.data)
    }
}
