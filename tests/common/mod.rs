#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, header};
use time::OffsetDateTime;
use time::macros::datetime;
use tokio::sync::Mutex;

use chronicle::application::articles::ArticleService;
use chronicle::application::auth::{PasswordHasher, TokenService};
use chronicle::application::media::{MediaError, MediaStore};
use chronicle::application::repos::{
    ArticleListing, ArticlesRepo, ArticlesWriteRepo, CreateArticleParams, ListWindow, RepoError,
    TagsRepo, UpdateArticleParams, UpdateUserParams, UsersRepo,
};
use chronicle::application::users::UserService;
use chronicle::cache::{Clock, RecentArticlesCache, SystemClock};
use chronicle::domain::cover::{CoverRef, PendingCover};
use chronicle::domain::entities::{
    ArticleId, ArticleRecord, ArticleSummary, RecentArticle, TagRecord, UserRecord,
};
use chronicle::infra::http::{self, ApiState, HttpState, RouterState};

pub const ADMIN_NAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "correct horse";
pub const BOUNDARY: &str = "chronicle-test-boundary";

const BASE_DATE: OffsetDateTime = datetime!(2024-03-01 00:00:00 UTC);

#[derive(Default)]
struct MemoryState {
    articles: Vec<ArticleRecord>,
    tags: Vec<TagRecord>,
    users: Vec<UserRecord>,
    next_article_id: i64,
    next_tag_id: i64,
    next_user_id: i64,
}

/// One in-memory table set backing every repository trait.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn fail_reads(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RepoError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("connection refused"));
        }
        Ok(())
    }

    /// Insert an article published `hours` after the base date.
    pub async fn seed_article(
        &self,
        title: &str,
        hours: i64,
        views: i32,
        tags: &[&str],
    ) -> ArticleId {
        let mut state = self.state.lock().await;
        state.next_article_id += 1;
        let id = state.next_article_id;
        state.articles.push(ArticleRecord {
            id,
            title: title.to_string(),
            author: "Ada".to_string(),
            description: None,
            content: format!("{title} body"),
            views,
            cover: Some(
                CoverRef::new(format!("my-blog-uploads/{id}"), "1700000000").expect("cover"),
            ),
            date: BASE_DATE + time::Duration::hours(hours),
        });
        for tag in tags {
            state.next_tag_id += 1;
            let tag_id = state.next_tag_id;
            state.tags.push(TagRecord {
                id: tag_id,
                tag: (*tag).to_string(),
                article_id: id,
            });
        }
        id
    }

    pub async fn article(&self, id: ArticleId) -> Option<ArticleRecord> {
        let state = self.state.lock().await;
        state.articles.iter().find(|article| article.id == id).cloned()
    }

    pub async fn tag_names(&self, id: ArticleId) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .tags
            .iter()
            .filter(|tag| tag.article_id == id)
            .map(|tag| tag.tag.clone())
            .collect()
    }
}

fn insert_tags(state: &mut MemoryState, article_id: ArticleId, tags: &[String]) {
    for tag in tags {
        state.next_tag_id += 1;
        let id = state.next_tag_id;
        state.tags.push(TagRecord {
            id,
            tag: tag.clone(),
            article_id,
        });
    }
}

#[async_trait]
impl ArticlesRepo for MemoryStore {
    async fn recent_listing(&self) -> Result<Vec<RecentArticle>, RepoError> {
        self.check()?;
        let state = self.state.lock().await;
        let mut by_date: Vec<ArticleSummary> =
            state.articles.iter().map(ArticleRecord::summary).collect();
        by_date.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));

        let Some(hottest) = by_date
            .iter()
            .take(5)
            .max_by(|a, b| a.views.cmp(&b.views).then(a.date.cmp(&b.date)))
            .cloned()
        else {
            return Ok(Vec::new());
        };

        let mut listing = vec![RecentArticle {
            article: hottest.clone(),
            hottest: true,
        }];
        listing.extend(
            by_date
                .into_iter()
                .filter(|article| article.id != hottest.id)
                .take(2)
                .map(|article| RecentArticle {
                    article,
                    hottest: false,
                }),
        );
        Ok(listing)
    }

    async fn list_articles(
        &self,
        exclude: &[ArticleId],
        window: Option<ListWindow>,
    ) -> Result<ArticleListing, RepoError> {
        self.check()?;
        let state = self.state.lock().await;
        let mut rows: Vec<ArticleSummary> = state
            .articles
            .iter()
            .filter(|article| !exclude.contains(&article.id))
            .map(ArticleRecord::summary)
            .collect();
        rows.sort_by(|a, b| b.id.cmp(&a.id));

        let rows = match window {
            Some(window) => rows
                .into_iter()
                .skip(window.offset as usize)
                .take(window.limit as usize)
                .collect(),
            None => rows,
        };

        Ok(ArticleListing {
            articles: rows,
            total_items: state.articles.len() as u64,
        })
    }

    async fn find_by_id(&self, id: ArticleId) -> Result<Option<ArticleRecord>, RepoError> {
        self.check()?;
        Ok(self.article(id).await)
    }

    async fn increment_views(&self, id: ArticleId) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        let article = state
            .articles
            .iter_mut()
            .find(|article| article.id == id)
            .ok_or(RepoError::NotFound)?;
        article.views += 1;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        self.check()
    }
}

#[async_trait]
impl ArticlesWriteRepo for MemoryStore {
    async fn create_article(
        &self,
        params: CreateArticleParams,
    ) -> Result<ArticleRecord, RepoError> {
        let mut state = self.state.lock().await;
        state.next_article_id += 1;
        let id = state.next_article_id;
        let record = ArticleRecord {
            id,
            title: params.title,
            author: params.author,
            description: params.description,
            content: params.content,
            views: 0,
            cover: params.cover,
            date: BASE_DATE + time::Duration::days(365) + time::Duration::minutes(id),
        };
        state.articles.push(record.clone());
        insert_tags(&mut state, id, &params.tags);
        Ok(record)
    }

    async fn update_article(
        &self,
        params: UpdateArticleParams,
    ) -> Result<ArticleRecord, RepoError> {
        let mut state = self.state.lock().await;
        let article = state
            .articles
            .iter_mut()
            .find(|article| article.id == params.id)
            .ok_or(RepoError::NotFound)?;
        article.title = params.title;
        article.author = params.author;
        article.description = params.description;
        article.content = params.content;
        if let Some(cover) = params.cover {
            article.cover = Some(cover);
        }
        let record = article.clone();

        if let Some(tags) = params.tags {
            state.tags.retain(|tag| tag.article_id != params.id);
            insert_tags(&mut state, params.id, &tags);
        }
        Ok(record)
    }

    async fn delete_article(&self, id: ArticleId) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        let before = state.articles.len();
        state.articles.retain(|article| article.id != id);
        if state.articles.len() == before {
            return Err(RepoError::NotFound);
        }
        state.tags.retain(|tag| tag.article_id != id);
        Ok(())
    }
}

#[async_trait]
impl TagsRepo for MemoryStore {
    async fn list_for_article(&self, article_id: ArticleId) -> Result<Vec<TagRecord>, RepoError> {
        self.check()?;
        let state = self.state.lock().await;
        Ok(state
            .tags
            .iter()
            .filter(|tag| tag.article_id == article_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn find_by_user_name(&self, user_name: &str) -> Result<Option<UserRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .find(|user| user.user_name == user_name)
            .cloned())
    }

    async fn create_user(
        &self,
        user_name: &str,
        hashed_password: &str,
    ) -> Result<UserRecord, RepoError> {
        let mut state = self.state.lock().await;
        if state.users.iter().any(|user| user.user_name == user_name) {
            return Err(RepoError::Duplicate {
                constraint: "users_user_name_key".to_string(),
            });
        }
        state.next_user_id += 1;
        let record = UserRecord {
            id: state.next_user_id,
            user_name: user_name.to_string(),
            hashed_password: hashed_password.to_string(),
        };
        state.users.push(record.clone());
        Ok(record)
    }

    async fn update_user(&self, params: UpdateUserParams) -> Result<UserRecord, RepoError> {
        let mut state = self.state.lock().await;
        let user = state
            .users
            .iter_mut()
            .find(|user| user.id == params.id)
            .ok_or(RepoError::NotFound)?;
        user.user_name = params.user_name;
        if let Some(hashed) = params.hashed_password {
            user.hashed_password = hashed;
        }
        Ok(user.clone())
    }
}

/// Media store double that hands out sequential public ids.
#[derive(Default)]
pub struct FakeMedia {
    uploads: AtomicU64,
    pub destroyed: Mutex<Vec<String>>,
    pub replaced: Mutex<Vec<String>>,
}

impl FakeMedia {
    pub fn upload_count(&self) -> u64 {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaStore for FakeMedia {
    async fn upload(
        &self,
        _cover: PendingCover,
        replace: Option<&CoverRef>,
    ) -> Result<CoverRef, MediaError> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        let public_id = match replace {
            Some(existing) => {
                self.replaced
                    .lock()
                    .await
                    .push(existing.public_id().to_string());
                existing.public_id().to_string()
            }
            None => format!("my-blog-uploads/upload-{n}"),
        };
        CoverRef::new(public_id, format!("{}", 1_800_000_000 + n))
            .map_err(|err| MediaError::invalid_response(err.to_string()))
    }

    async fn destroy(&self, cover: &CoverRef) -> Result<(), MediaError> {
        self.destroyed
            .lock()
            .await
            .push(cover.public_id().to_string());
        Ok(())
    }

    fn delivery_url(&self, cover: &CoverRef) -> String {
        format!(
            "https://media.test/image/upload/v{}/{}.jpg",
            cover.version(),
            cover.public_id()
        )
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub media: Arc<FakeMedia>,
    pub users: Arc<UserService>,
    pub recent: Arc<RecentArticlesCache>,
}

impl TestApp {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::default());
        let media = Arc::new(FakeMedia::default());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let recent = Arc::new(RecentArticlesCache::new(
            store.clone(),
            store.clone(),
            clock.clone(),
            Duration::from_secs(7200),
        ));
        let articles = Arc::new(ArticleService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            media.clone(),
            recent.clone(),
        ));
        let users = Arc::new(UserService::new(
            store.clone(),
            TokenService::new("test-secret", Duration::from_secs(3600), clock),
            PasswordHasher::new(4),
        ));
        users
            .ensure_admin(ADMIN_NAME, ADMIN_PASSWORD)
            .await
            .expect("seed admin");

        let router = http::build_router(RouterState {
            http: HttpState {
                db: store.clone(),
                max_request_bytes: 1024 * 1024,
            },
            api: ApiState {
                articles,
                users: users.clone(),
            },
        });

        Self {
            router,
            store,
            media,
            users,
            recent,
        }
    }

    pub fn token(&self) -> String {
        self.users
            .tokens()
            .issue(ADMIN_NAME)
            .expect("issue token")
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token())
    }
}

/// Build a multipart body with a `data` JSON field and an optional cover file.
pub fn article_form(data: &str, cover: Option<&[u8]>) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"data\"\r\n\r\n{data}\r\n"
        )
        .as_bytes(),
    );
    if let Some(bytes) = cover {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"cover\"; filename=\"cover.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_request(
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: Vec<u8>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(value) = auth {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::from(body)).expect("request")
}

pub fn json_request(
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(value) = auth {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}
