use axum::{extract::State, Extension, Json};
use std::sync::Arc;

use crate::domain::feed::{GetUserFeedsRequest, GetUserFeedsResponse};
use crate::{
    domain::feed::{FeedService, FeedServiceApi},
    error::AppResult,
    infrastructure::auth::AuthUser,
};

pub struct FeedController {
    feed_service: Arc<FeedService>,
}

impl FeedController {
    pub fn new(feed_service: Arc<FeedService>) -> Self {
        Self { feed_service }
    }

    /// POST /api/feeds/aggregate - merged reverse-chronological feed page
    pub async fn aggregate_feeds(
        State(controller): State<Arc<FeedController>>,
        Extension(auth_user): Extension<AuthUser>,
        Json(request): Json<GetUserFeedsRequest>,
    ) -> AppResult<Json<GetUserFeedsResponse>> {
        let page = controller
            .feed_service
            .get_user_feeds(auth_user.user_id, request)
            .await?;
        Ok(Json(page.into()))
    }
}
