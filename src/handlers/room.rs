//! Room membership handlers: `join-room` and `leave-room`.
//!
//! ## Behavior
//! - Join is subject to the per-connection join budget and the room access policy
//! - Joining a room twice is a no-op and announces nothing
//! - Leaving clears any typing indicator the user had in that room

use super::{Context, Handler, HandlerError, HandlerResult};
use async_trait::async_trait;
use roomcast_proto::{Envelope, RoomId};
use tracing::debug;

pub struct JoinRoomHandler;

#[async_trait]
impl Handler for JoinRoomHandler {
    async fn handle(&self, ctx: &Context<'_>, env: &Envelope) -> HandlerResult {
        let room: RoomId = env.payload()?;

        if !ctx.matrix.rate_limiter.check_join_rate(&ctx.handle.id) {
            return Err(HandlerError::RateLimited);
        }

        ctx.matrix.join_room(ctx.handle, room.clone()).await?;
        debug!(room = %room, user = %ctx.user_id(), "joined");
        Ok(())
    }
}

pub struct LeaveRoomHandler;

#[async_trait]
impl Handler for LeaveRoomHandler {
    async fn handle(&self, ctx: &Context<'_>, env: &Envelope) -> HandlerResult {
        let room: RoomId = env.payload()?;
        ctx.matrix.leave_room(ctx.handle, room)
    }
}
