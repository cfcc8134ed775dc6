#![allow(dead_code)]
//! Shared harness for the HTTP tests: scripted doubles for the identity
//! provider and the stores, plus a small browser-like client that keeps
//! cookies between requests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use axum_extra::extract::cookie::Key;
use plaza::config::{Config, IdentityConfig, TableConfig};
use plaza::identity::{Attributes, IdentityError, IdentityService, TokenPair, User};
use plaza::state::AppState;
use plaza::store::like::{Like, LikeStore};
use plaza::store::post::{post_id, NewPost, Post, PostStore};
use plaza::store::StoreError;
use tower::ServiceExt;

/// The one password every scripted account accepts.
pub const PASSWORD: &str = "correct-horse";
/// The one verification code the scripted provider confirms.
pub const VERIFY_CODE: &str = "123456";

/// Scripted identity provider. Accounts sign in by email and the token
/// scheme is fixed so tests can predict it: a login hands out
/// `refresh-{email}`, and each refresh exchange mints `access-{email}`.
pub struct FakeIdentity {
    pub users: Mutex<Vec<User>>,
    refresh_works: AtomicBool,
    pub calls: Mutex<Vec<String>>,
}

impl FakeIdentity {
    pub fn with_users(users: Vec<User>) -> Arc<Self> {
        Arc::new(Self {
            users: Mutex::new(users),
            refresh_works: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Makes every refresh exchange fail from now on, as if the stored
    /// refresh token had been revoked.
    pub fn break_refresh(&self) {
        self.refresh_works.store(false, Ordering::SeqCst);
    }

    pub fn saw_call(&self, prefix: &str) -> bool {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .any(|call| call.starts_with(prefix))
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn by_email(&self, email: &str) -> Option<User> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|user| user.email == email)
            .cloned()
    }
}

#[async_trait]
impl IdentityService for FakeIdentity {
    async fn signup(
        &self,
        username: &str,
        _password: &str,
        attributes: Attributes,
    ) -> Result<(), IdentityError> {
        self.record(format!("signup:{username}"));
        if self.by_email(username).is_some() {
            return Err(IdentityError::UsernameExists);
        }
        if let Some(user) = User::from_attributes(&attributes) {
            self.users.lock().unwrap().push(user);
        }
        Ok(())
    }

    async fn verify(&self, username: &str, code: &str) -> Result<(), IdentityError> {
        self.record(format!("verify:{username}"));
        if code == VERIFY_CODE {
            Ok(())
        } else {
            Err(IdentityError::CodeMismatch)
        }
    }

    async fn login(&self, username: &str, password: &str) -> Result<TokenPair, IdentityError> {
        self.record(format!("login:{username}"));
        if password == PASSWORD && self.by_email(username).is_some() {
            Ok(TokenPair {
                access_token: format!("access-{username}"),
                refresh_token: format!("refresh-{username}"),
            })
        } else {
            Err(IdentityError::NotAuthorized)
        }
    }

    async fn account_details(&self, access_token: &str) -> Result<Option<User>, IdentityError> {
        let email = access_token.strip_prefix("access-").unwrap_or_default();
        Ok(self.by_email(email))
    }

    async fn get_user(&self, username: &str) -> Result<Option<User>, IdentityError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn update_user(
        &self,
        access_token: &str,
        attributes: Attributes,
    ) -> Result<(), IdentityError> {
        self.record(format!("update_user:{access_token}"));
        let email = access_token.strip_prefix("access-").unwrap_or_default().to_owned();
        let mut users = self.users.lock().unwrap();
        let Some(user) = users.iter_mut().find(|user| user.email == email) else {
            return Err(IdentityError::NotAuthorized);
        };
        for (name, value) in attributes {
            match name.as_str() {
                "name" => user.name = value,
                "locale" => user.locale = value,
                "profile" => user.bio = value,
                "website" => user.website = value,
                _ => {}
            }
        }
        Ok(())
    }

    async fn change_password(
        &self,
        access_token: &str,
        old_password: &str,
        _new_password: &str,
    ) -> Result<(), IdentityError> {
        self.record(format!("change_password:{access_token}"));
        if old_password == PASSWORD {
            Ok(())
        } else {
            Err(IdentityError::NotAuthorized)
        }
    }

    async fn get_token(
        &self,
        username: &str,
        refresh_token: &str,
    ) -> Result<String, IdentityError> {
        self.record(format!("get_token:{username}"));
        if self.refresh_works.load(Ordering::SeqCst)
            && refresh_token == format!("refresh-{username}")
        {
            Ok(format!("access-{username}"))
        } else {
            Err(IdentityError::NotAuthorized)
        }
    }
}

/// In-memory post rows behind the store trait.
#[derive(Default)]
pub struct FakePosts {
    pub rows: Mutex<Vec<Post>>,
}

impl FakePosts {
    pub fn fresh() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_rows(rows: Vec<Post>) -> Arc<Self> {
        Arc::new(Self {
            rows: Mutex::new(rows),
        })
    }
}

#[async_trait]
impl PostStore for FakePosts {
    async fn create_post(&self, new: NewPost) -> Result<Post, StoreError> {
        let created = chrono::Utc::now().timestamp();
        let post = Post {
            id: post_id(&new.title, created),
            title: new.title,
            content: new.content,
            cover: new.cover,
            author: new.author,
            username: new.username,
            user_pic: new.user_pic,
            publish: new.publish,
            created,
            updated: created,
            reading_time: new.reading_time,
            likes_count: 0,
        };
        self.rows.lock().unwrap().push(post.clone());
        Ok(post)
    }

    async fn get_post(&self, username: &str, id: &str) -> Result<Option<Post>, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|post| post.username == username && post.id == id)
            .cloned())
    }

    async fn get_user_posts(&self, username: &str) -> Result<Vec<Post>, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|post| post.username == username && post.publish == 1)
            .cloned()
            .collect())
    }

    async fn get_posts(&self) -> Result<Vec<Post>, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|post| post.publish == 1)
            .cloned()
            .collect())
    }

    async fn update_post(
        &self,
        id: &str,
        cover: &str,
        content: &str,
        _created: i64,
    ) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|post| post.id == id) {
            Some(post) => {
                post.cover = cover.to_owned();
                post.content = content.to_owned();
                Ok(())
            }
            None => Err(StoreError::Malformed {
                op: "update_post",
                reason: "no such row",
            }),
        }
    }

    async fn get_count(&self) -> i64 {
        self.rows.lock().unwrap().len() as i64
    }
}

/// In-memory like rows. `break_store` flips every later call into an
/// error.
#[derive(Default)]
pub struct FakeLikes {
    pub rows: Mutex<Vec<Like>>,
    fail_all: AtomicBool,
}

impl FakeLikes {
    pub fn fresh() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_rows(rows: Vec<Like>) -> Arc<Self> {
        Arc::new(Self {
            rows: Mutex::new(rows),
            fail_all: AtomicBool::new(false),
        })
    }

    pub fn break_store(&self) {
        self.fail_all.store(true, Ordering::SeqCst);
    }

    fn check(&self, op: &'static str) -> Result<(), StoreError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(StoreError::Malformed {
                op,
                reason: "scripted failure",
            });
        }
        Ok(())
    }
}

#[async_trait]
impl LikeStore for FakeLikes {
    async fn get_likes(&self, post_id: &str) -> Result<Vec<Like>, StoreError> {
        self.check("get_likes")?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|like| like.id == post_id)
            .cloned()
            .collect())
    }

    async fn get_like(&self, post_id: &str, username: &str) -> Result<Option<Like>, StoreError> {
        self.check("get_like")?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|like| like.id == post_id && like.username == username)
            .cloned())
    }

    async fn toggle_like(&self, post_id: &str, username: &str) -> Result<(), StoreError> {
        self.check("toggle_like")?;
        let mut rows = self.rows.lock().unwrap();
        match rows
            .iter()
            .position(|like| like.id == post_id && like.username == username)
        {
            Some(at) => {
                rows.remove(at);
            }
            None => rows.push(Like {
                id: post_id.to_owned(),
                username: username.to_owned(),
                created: chrono::Utc::now().timestamp(),
            }),
        }
        Ok(())
    }
}

/// An account with a display name, signed in as gopher@example.com.
pub fn gopher() -> User {
    User {
        id: "sub-1".to_owned(),
        username: "gopher".to_owned(),
        name: "Gopher Dev".to_owned(),
        email: "gopher@example.com".to_owned(),
        locale: "Earth".to_owned(),
        ..Default::default()
    }
}

/// A published post row with the usual fields filled in.
pub fn seed_post(id: &str, username: &str, title: &str) -> Post {
    Post {
        id: id.to_owned(),
        title: title.to_owned(),
        content: "Some prose worth reading.".to_owned(),
        author: username.to_owned(),
        username: username.to_owned(),
        publish: 1,
        created: 1_700_000_000,
        updated: 1_700_000_000,
        reading_time: 3,
        ..Default::default()
    }
}

fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_owned(),
        port: 0,
        identity: IdentityConfig {
            client_id: "client-1234".to_owned(),
            client_secret: "top-secret".to_owned(),
            pool_id: "pool-1".to_owned(),
        },
        tables: TableConfig {
            posts: "posts".to_owned(),
            likes: "likes".to_owned(),
            endpoint: None,
        },
        session_key: Key::derive_from(b"an unguessable test key well over 32 bytes"),
        github: None,
        slack_token: None,
    }
}

/// The full router wired to the given doubles.
pub fn app(
    identity: Arc<FakeIdentity>,
    posts: Arc<FakePosts>,
    likes: Arc<FakeLikes>,
) -> Router {
    let state =
        AppState::new(test_config(), identity, posts, likes).expect("test state builds");
    plaza::routes::app(state)
}

/// Just enough of a cookie jar: keeps the name=value pairs from
/// Set-Cookie headers and drops a pair when a removal (empty value)
/// comes back.
#[derive(Default)]
pub struct Cookies {
    pairs: BTreeMap<String, String>,
}

impl Cookies {
    pub fn absorb(&mut self, response: &Response) {
        for header_value in response.headers().get_all(header::SET_COOKIE) {
            let Ok(raw) = header_value.to_str() else { continue };
            let pair = raw.split(';').next().unwrap_or_default();
            let Some((name, value)) = pair.split_once('=') else { continue };
            if value.is_empty() {
                self.pairs.remove(name);
            } else {
                self.pairs.insert(name.to_owned(), value.to_owned());
            }
        }
    }

    pub fn header(&self) -> String {
        self.pairs
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn has(&self, name: &str) -> bool {
        self.pairs.contains_key(name)
    }
}

/// One browsing session against the app: every response's cookies feed
/// the next request, the way a browser would.
pub struct Client {
    app: Router,
    pub cookies: Cookies,
}

impl Client {
    pub fn new(app: Router) -> Self {
        Self {
            app,
            cookies: Cookies::default(),
        }
    }

    pub async fn get(&mut self, uri: &str) -> Response {
        let request = self.request("GET", uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn put(&mut self, uri: &str) -> Response {
        let request = self.request("PUT", uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn post_form(&mut self, uri: &str, body: &str) -> Response {
        let request = self
            .request("POST", uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_owned()))
            .unwrap();
        self.send(request).await
    }

    /// Signs the given account in through the login form and checks the
    /// session cookie arrived.
    pub async fn sign_in(&mut self, email: &str) {
        let body = format!("email={email}&password={PASSWORD}");
        let response = self.post_form("/login", &body).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "login should redirect");
        assert_eq!(location(&response), "/");
        assert!(self.cookies.has("user"), "login should set the session cookie");
    }

    fn request(&self, method: &str, uri: &str) -> axum::http::request::Builder {
        let mut builder = Request::builder().method(method).uri(uri);
        if !self.cookies.header().is_empty() {
            builder = builder.header(header::COOKIE, self.cookies.header());
        }
        builder
    }

    async fn send(&mut self, request: Request<Body>) -> Response {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("infallible service");
        self.cookies.absorb(&response);
        response
    }
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    String::from_utf8(bytes.to_vec()).expect("body is utf-8")
}

pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}
