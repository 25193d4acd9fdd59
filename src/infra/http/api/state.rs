use std::sync::Arc;

use crate::application::accounts::AccountService;
use crate::application::listing::ListingService;
use crate::application::posts::PostService;
use crate::application::session::SessionService;
use crate::infra::http::session::SessionCookie;

#[derive(Clone)]
pub struct ApiState {
    pub listing: Arc<ListingService>,
    pub posts: Arc<PostService>,
    pub accounts: Arc<AccountService>,
    pub sessions: Arc<SessionService>,
    pub cookie: SessionCookie,
}
