use crate::{
    config::Config,
    error::Result,
    services::{
        bookmark::BookmarkService,
        comment::CommentService,
        database::Database,
        reaction::ReactionService,
        relation::RelationService,
        store::EntityStore,
        user::UserService,
    },
};
use std::sync::Arc;

/// 应用程序的共享状态
/// 包含所有服务和配置的引用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 用户档案服务
    pub user_service: UserService,

    /// 点赞服务
    pub relation_service: RelationService,

    /// 评论服务
    pub comment_service: CommentService,

    /// 表情回应服务
    pub reaction_service: ReactionService,

    /// 书签服务
    pub bookmark_service: BookmarkService,
}

impl AppState {
    /// 连接存储并初始化所有服务
    pub async fn init(config: Config) -> Result<Self> {
        let db = Database::primary(&config).await?;
        db.verify_connection().await?;
        let primary: Arc<dyn EntityStore> = Arc::new(db);

        let secondary: Arc<dyn EntityStore> = match Database::secondary(&config).await? {
            Some(db) => Arc::new(db),
            // 未配置独立书签存储时，缓存落在主存储的 bookmark_profile 集合
            None => primary.clone(),
        };

        Ok(Self::with_stores(config, primary, secondary))
    }

    /// Wire the services over explicit store backends. Tests pass
    /// in-memory stores here.
    pub fn with_stores(
        config: Config,
        primary: Arc<dyn EntityStore>,
        secondary: Arc<dyn EntityStore>,
    ) -> Self {
        Self {
            user_service: UserService::new(primary.clone()),
            relation_service: RelationService::new(primary.clone()),
            comment_service: CommentService::new(primary.clone()),
            reaction_service: ReactionService::new(primary.clone()),
            bookmark_service: BookmarkService::new(primary, secondary),
            config,
        }
    }

    /// 检查功能是否启用
    pub fn is_feature_enabled(&self, feature: &str) -> bool {
        match feature {
            "comments" => self.config.enable_comments,
            "reactions" => self.config.enable_reactions,
            _ => false,
        }
    }
}
