//! Typing indicator handlers: `typing` and `stop-typing`.

use super::{Context, Handler, HandlerError, HandlerResult};
use async_trait::async_trait;
use roomcast_proto::{Envelope, RoomId};

pub struct TypingHandler;

#[async_trait]
impl Handler for TypingHandler {
    async fn handle(&self, ctx: &Context<'_>, env: &Envelope) -> HandlerResult {
        let room: RoomId = env.payload()?;
        if !ctx.matrix.rate_limiter.check_message_rate(&ctx.handle.id) {
            return Err(HandlerError::RateLimited);
        }
        ctx.matrix.start_typing(ctx.handle, room)
    }
}

pub struct StopTypingHandler;

#[async_trait]
impl Handler for StopTypingHandler {
    async fn handle(&self, ctx: &Context<'_>, env: &Envelope) -> HandlerResult {
        let room: RoomId = env.payload()?;
        if !ctx.matrix.rate_limiter.check_message_rate(&ctx.handle.id) {
            return Err(HandlerError::RateLimited);
        }
        ctx.matrix.stop_typing(ctx.handle, room)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::{self, drain, room};
    use roomcast_proto::ServerEvent;

    #[tokio::test]
    async fn typing_then_stop_is_seen_by_others() {
        let t = testing::matrix();
        let (alice, mut alice_rx) = t.matrix.activate(testing::identity("u1", "alice"));
        let (bob, mut bob_rx) = t.matrix.activate(testing::identity("u2", "bob"));
        t.matrix.join_room(&alice, room("r1")).await.unwrap();
        t.matrix.join_room(&bob, room("r1")).await.unwrap();
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        let ctx = Context::new(&t.matrix, &alice);
        TypingHandler
            .handle(&ctx, &Envelope::parse(r#"{"event":"typing","data":"r1"}"#).unwrap())
            .await
            .unwrap();
        StopTypingHandler
            .handle(
                &ctx,
                &Envelope::parse(r#"{"event":"stop-typing","data":"r1"}"#).unwrap(),
            )
            .await
            .unwrap();

        let seen = drain(&mut bob_rx);
        assert!(matches!(
            seen.as_slice(),
            [ServerEvent::UserTyping(_), ServerEvent::UserStopTyping(s)] if s.user_id == "u1"
        ));
        assert!(drain(&mut alice_rx).is_empty());
    }

    #[tokio::test]
    async fn typing_outside_room_is_rejected() {
        let t = testing::matrix();
        let (alice, _rx) = t.matrix.activate(testing::identity("u1", "alice"));

        let err = TypingHandler
            .handle(
                &Context::new(&t.matrix, &alice),
                &Envelope::parse(r#"{"event":"typing","data":"r1"}"#).unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::NotInRoom(_)));
    }
}
