//! Request dispatch
//!
//! Maps a request type tag to a handler. Every connection on a server shares
//! one dispatcher. An unregistered tag is fatal to the connection that sent
//! it, as is a handler error.

use std::collections::BTreeMap;

use bytes::Bytes;
use scaffolding_core::{Member, Room};

use crate::buffer::ByteBuffer;
use crate::error::ProtocolError;
use crate::frame::{Response, MAX_TAG_LEN};
use crate::protocol::{request, PROTOCOL_SEPARATOR};
use crate::registry::{ConnectionId, ConnectionRegistry};

/// Everything a handler may touch while serving one request
pub struct RequestContext<'a> {
    /// The requesting connection
    pub connection: ConnectionId,
    pub room: &'a Room,
    pub connections: &'a ConnectionRegistry,
    pub dispatcher: &'a Dispatcher,
}

/// Serves one request type
pub trait RequestHandler: Send + Sync {
    fn handle(&self, ctx: &RequestContext<'_>, body: &[u8]) -> Result<Response, ProtocolError>;
}

impl<F> RequestHandler for F
where
    F: Fn(&RequestContext<'_>, &[u8]) -> Result<Response, ProtocolError> + Send + Sync,
{
    fn handle(&self, ctx: &RequestContext<'_>, body: &[u8]) -> Result<Response, ProtocolError> {
        self(ctx, body)
    }
}

/// Registry of request handlers keyed by type tag
#[derive(Default)]
pub struct Dispatcher {
    handlers: BTreeMap<String, Box<dyn RequestHandler>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("tags", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Dispatcher {
    /// Dispatcher with no handlers
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher serving the core `c:` requests
    pub fn with_builtins() -> Self {
        let mut dispatcher = Self::new();
        dispatcher.insert(request::PING, handle_ping);
        dispatcher.insert(request::PROTOCOLS, handle_protocols);
        dispatcher.insert(request::SERVER_PORT, handle_server_port);
        dispatcher.insert(request::PLAYER_PING, handle_player_ping);
        dispatcher.insert(request::PLAYER_PROFILES_LIST, handle_player_profiles_list);
        dispatcher
    }

    /// Register or replace the handler for `tag`
    pub fn register(
        &mut self,
        tag: impl Into<String>,
        handler: impl RequestHandler + 'static,
    ) -> Result<(), ProtocolError> {
        let tag = tag.into();
        if tag.len() > MAX_TAG_LEN {
            return Err(ProtocolError::TagTooLong(tag.len()));
        }
        self.insert(tag, handler);
        Ok(())
    }

    fn insert(&mut self, tag: impl Into<String>, handler: impl RequestHandler + 'static) {
        self.handlers.insert(tag.into(), Box::new(handler));
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.handlers.contains_key(tag)
    }

    /// Registered tags in sorted order
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Run the handler for `tag`
    pub fn dispatch(
        &self,
        connection: ConnectionId,
        room: &Room,
        connections: &ConnectionRegistry,
        tag: &str,
        body: &[u8],
    ) -> Result<Response, ProtocolError> {
        let handler = self
            .handlers
            .get(tag)
            .ok_or_else(|| ProtocolError::UnknownRequest(tag.to_string()))?;

        let ctx = RequestContext {
            connection,
            room,
            connections,
            dispatcher: self,
        };
        handler.handle(&ctx, body)
    }
}

fn handle_ping(_ctx: &RequestContext<'_>, body: &[u8]) -> Result<Response, ProtocolError> {
    Ok(Response::ok(Bytes::copy_from_slice(body)))
}

fn handle_protocols(ctx: &RequestContext<'_>, _body: &[u8]) -> Result<Response, ProtocolError> {
    let tags: Vec<&str> = ctx.dispatcher.tags().collect();
    let joined = tags.join(PROTOCOL_SEPARATOR);
    Ok(Response::ok(joined.into_bytes()))
}

fn handle_server_port(ctx: &RequestContext<'_>, _body: &[u8]) -> Result<Response, ProtocolError> {
    let mut buf = ByteBuffer::new();
    buf.write_u16(ctx.room.server_port());
    Ok(Response::ok(buf.freeze()))
}

fn handle_player_ping(ctx: &RequestContext<'_>, body: &[u8]) -> Result<Response, ProtocolError> {
    let member =
        Member::from_bytes(body).map_err(|e| ProtocolError::Malformed(format!("member: {e}")))?;

    tracing::debug!(
        connection = %ctx.connection,
        machine_id = %member.machine_id,
        name = %member.name,
        "Player announced"
    );
    match ctx.connections.bind_machine_id(ctx.connection, &member.machine_id) {
        Some(bound) if bound != member.machine_id => {
            return Err(ProtocolError::Malformed(format!(
                "connection already announced as {bound}"
            )));
        }
        _ => {}
    }
    ctx.room.join(member);

    Ok(Response::empty())
}

fn handle_player_profiles_list(
    ctx: &RequestContext<'_>,
    _body: &[u8],
) -> Result<Response, ProtocolError> {
    let body = Member::list_to_bytes(&ctx.room.members())
        .map_err(|e| ProtocolError::Malformed(format!("member list: {e}")))?;
    Ok(Response::ok(body))
}
