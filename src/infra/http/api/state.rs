use std::sync::Arc;

use crate::application::articles::ArticleService;
use crate::application::users::UserService;

#[derive(Clone)]
pub struct ApiState {
    pub articles: Arc<ArticleService>,
    pub users: Arc<UserService>,
}
