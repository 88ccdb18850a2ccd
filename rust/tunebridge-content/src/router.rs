use std::rc::Rc;

use async_trait::async_trait;
use futures_util::{FutureExt, future::LocalBoxFuture};
use serde::Deserialize;
use serde_json::Value;
use tunebridge_store::{QueryResult, Reporter, ShardedStoreReader, TrackDatabase};

use crate::{
    BackgroundPort, ContentError, IdentityRelay, Injector, Request, Response, UserSession,
};

/// Something that can produce the page's cached tracks.
#[async_trait(?Send)]
pub trait LocalTracks {
    /// Reads the cache, or `None` when nothing can be read.
    async fn local_tracks(&self) -> Option<QueryResult>;
}

/// Something that can ask the page for a fresh session token.
pub trait TokenRefresh {
    /// Starts a refresh; the token itself arrives later.
    fn refresh_token(&self) -> Result<(), ContentError>;
}

impl<T> TokenRefresh for Rc<T>
where
    T: TokenRefresh + ?Sized,
{
    fn refresh_token(&self) -> Result<(), ContentError> {
        (**self).refresh_token()
    }
}

impl<I, B> TokenRefresh for IdentityRelay<I, B>
where
    I: Injector,
    B: BackgroundPort,
{
    fn refresh_token(&self) -> Result<(), ContentError> {
        IdentityRelay::refresh_token(self)
    }
}

/// Reads tracks for whichever user the page announced last.
pub struct LocalTrackSource<Db, R> {
    reader: ShardedStoreReader<Db, R>,
    session: UserSession,
}

impl<Db, R> LocalTrackSource<Db, R>
where
    Db: TrackDatabase,
    R: Reporter,
{
    /// Pairs `reader` with the session the identity relay writes to.
    pub fn new(reader: ShardedStoreReader<Db, R>, session: UserSession) -> Self {
        Self { reader, session }
    }
}

#[async_trait(?Send)]
impl<Db, R> LocalTracks for LocalTrackSource<Db, R>
where
    Db: TrackDatabase,
    R: Reporter,
{
    async fn local_tracks(&self) -> Option<QueryResult> {
        let user_id = self.session.user_id();
        self.reader.query(user_id.as_deref()).await
    }
}

/// How (and whether) a request gets answered.
pub enum Reply {
    /// Answer right away
    Now(Response),
    /// Answer once the future settles; the response channel must be kept
    /// open until then
    Later(LocalBoxFuture<'static, Response>),
    /// Do not answer at all
    Silent,
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Now(response) => f.debug_tuple("Now").field(response).finish(),
            Reply::Later(_) => f.write_str("Later(..)"),
            Reply::Silent => f.write_str("Silent"),
        }
    }
}

/// Dispatches requests from the background process.
///
/// Requests are independent: nothing is queued and concurrent track reads
/// may settle in any order.
pub struct RequestRouter<T, R> {
    tracks: Rc<T>,
    refresh: R,
}

impl<T, R> RequestRouter<T, R>
where
    T: LocalTracks + 'static,
    R: TokenRefresh,
{
    /// Routes track reads to `tracks` and token refreshes to `refresh`.
    pub fn new(tracks: T, refresh: R) -> Self {
        Self {
            tracks: Rc::new(tracks),
            refresh,
        }
    }

    /// Decides how to answer `request`.
    pub fn route(&self, request: Request) -> Reply {
        match request {
            Request::GetLocalTracks => {
                let tracks = self.tracks.clone();
                Reply::Later(
                    async move { Response::Tracks(tracks.local_tracks().await) }.boxed_local(),
                )
            }
            Request::GetXsrf => {
                if let Err(error) = self.refresh.refresh_token() {
                    tracing::error!(%error, "failed to start token refresh");
                }
                Reply::Now(Response::Ack)
            }
            Request::Unknown => {
                tracing::debug!("ignoring request with an unknown action");
                Reply::Silent
            }
        }
    }

    /// Decodes and routes a raw message; anything that is not a request is
    /// left unanswered.
    pub fn route_value(&self, message: &Value) -> Reply {
        match Request::deserialize(message) {
            Ok(request) => self.route(request),
            Err(error) => {
                tracing::debug!(%error, "ignoring message that is not a request");
                Reply::Silent
            }
        }
    }
}
