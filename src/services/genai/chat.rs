use anyhow::Result;
use futures::stream::{self, BoxStream, StreamExt};

use super::client::{GenAiClient, GenerateContentResponse};
use crate::protocol::content::Content;

/// Multi-turn conversation. History only grows when a call succeeds.
pub struct ChatSession {
    client: GenAiClient,
    history: Vec<Content>,
}

impl ChatSession {
    pub fn new(client: GenAiClient) -> Self {
        Self::with_history(client, Vec::new())
    }

    pub fn with_history(client: GenAiClient, history: Vec<Content>) -> Self {
        Self { client, history }
    }

    pub fn history(&self) -> &[Content] {
        &self.history
    }

    pub async fn send_message(&mut self, text: &str) -> Result<GenerateContentResponse> {
        let user = Content::text(text).with_role("user");
        let mut contents = self.history.clone();
        contents.push(user.clone());

        let response = self.client.generate_content(&contents).await?;

        self.history.push(user);
        if let Some(reply) = response.content() {
            self.history.push(reply.clone().with_role("model"));
        }
        Ok(response)
    }

    /// Streaming variant of [`ChatSession::send_message`]. The exchange is
    /// added to history once the stream has been drained without error; the
    /// model turn is the concatenated text of every partial.
    pub async fn send_message_stream(
        &mut self,
        text: &str,
    ) -> Result<BoxStream<'_, Result<GenerateContentResponse>>> {
        let user = Content::text(text).with_role("user");
        let mut contents = self.history.clone();
        contents.push(user.clone());

        let partials = self.client.generate_content_stream(&contents).await?;
        let state = (partials, &mut self.history, Some(user), String::new(), false);

        let turn = stream::unfold(state, |(mut partials, history, mut user, mut reply, mut failed)| async move {
            match partials.next().await {
                Some(Ok(partial)) => {
                    reply.push_str(&partial.text());
                    Some((Ok(partial), (partials, history, user, reply, failed)))
                }
                Some(Err(e)) => {
                    failed = true;
                    Some((Err(e), (partials, history, user, reply, failed)))
                }
                None => {
                    if let Some(user) = user.take().filter(|_| !failed) {
                        history.push(user);
                        history.push(Content::text(reply).with_role("model"));
                    }
                    None
                }
            }
        });
        Ok(turn.boxed())
    }
}
