//! Messaging handlers: `send-message` and `message-read`.
//!
//! Both share the per-connection message budget and require the sender to be
//! a member of the target room.

use super::{Context, Handler, HandlerError, HandlerResult};
use async_trait::async_trait;
use roomcast_proto::{Envelope, MessageRead, SendMessage};

fn check_rate(ctx: &Context<'_>) -> HandlerResult {
    if ctx.matrix.rate_limiter.check_message_rate(&ctx.handle.id) {
        Ok(())
    } else {
        Err(HandlerError::RateLimited)
    }
}

pub struct SendMessageHandler;

#[async_trait]
impl Handler for SendMessageHandler {
    async fn handle(&self, ctx: &Context<'_>, env: &Envelope) -> HandlerResult {
        let msg: SendMessage = env.payload()?;
        check_rate(ctx)?;
        ctx.matrix.send_message(ctx.handle, msg)
    }
}

pub struct MessageReadHandler;

#[async_trait]
impl Handler for MessageReadHandler {
    async fn handle(&self, ctx: &Context<'_>, env: &Envelope) -> HandlerResult {
        let read: MessageRead = env.payload()?;
        check_rate(ctx)?;
        ctx.matrix.mark_read(ctx.handle, read)
    }
}
