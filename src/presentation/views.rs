use crate::application::error::{ErrorReport, HttpError};
use crate::application::pagination::{Page, PageMeta};
use crate::application::session::Viewer;
use crate::domain::entities::PostWithAuthorRecord;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};
use url::form_urlencoded;

const SITE_TITLE: &str = "Postboard";
const EXCERPT_CHARS: usize = 280;
const DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute] UTC");

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let view = LayoutContext::new(chrome.titled("Not found"), ErrorPageView::not_found());
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// Render an error page for `error`, keeping its status and diagnostic report.
pub fn render_http_error_response(chrome: LayoutChrome, error: HttpError) -> Response {
    let (status, public_message, report) = error.into_parts();
    let content = ErrorPageView {
        title: status
            .canonical_reason()
            .unwrap_or("Something went wrong")
            .to_string(),
        message: public_message.to_string(),
    };
    let view = LayoutContext::new(chrome.titled("Error"), content);
    let mut response = render_template_response(ErrorTemplate { view }, status);
    report.attach(&mut response);
    response
}

/// Signed-in user shown in the header.
#[derive(Clone)]
pub struct ViewerBadge {
    pub name: String,
    pub username: String,
}

impl From<&Viewer> for ViewerBadge {
    fn from(viewer: &Viewer) -> Self {
        Self {
            name: viewer.name.clone(),
            username: viewer.username.clone(),
        }
    }
}

#[derive(Clone)]
pub struct LayoutChrome {
    pub site_title: String,
    pub page_title: String,
    pub viewer: Option<ViewerBadge>,
}

impl LayoutChrome {
    pub fn new(viewer: Option<&Viewer>) -> Self {
        Self {
            site_title: SITE_TITLE.to_string(),
            page_title: SITE_TITLE.to_string(),
            viewer: viewer.map(ViewerBadge::from),
        }
    }

    pub fn titled(self, title: impl AsRef<str>) -> Self {
        Self {
            page_title: format!("{} · {}", title.as_ref(), self.site_title),
            ..self
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub site_title: String,
    pub page_title: String,
    pub viewer: Option<ViewerBadge>,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            site_title: chrome.site_title,
            page_title: chrome.page_title,
            viewer: chrome.viewer,
            content,
        }
    }
}

#[derive(Clone)]
pub struct PostCard {
    pub id: String,
    pub title: String,
    pub excerpt: String,
    pub author_name: String,
    pub author_username: String,
    pub updated: String,
    pub iso_date: String,
    pub published: bool,
}

impl From<PostWithAuthorRecord> for PostCard {
    fn from(record: PostWithAuthorRecord) -> Self {
        let PostWithAuthorRecord { post, author } = record;
        Self {
            id: post.id.to_string(),
            title: post.title,
            excerpt: excerpt(&post.content),
            author_name: author.name,
            author_username: author.username,
            updated: format_timestamp(post.updated_at),
            iso_date: post.updated_at.date().to_string(),
            published: post.published,
        }
    }
}

fn excerpt(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{}…", head.trim_end())
    } else {
        head
    }
}

fn format_timestamp(value: OffsetDateTime) -> String {
    value
        .to_offset(time::UtcOffset::UTC)
        .format(DATE_FORMAT)
        .unwrap_or_else(|_| value.date().to_string())
}

pub struct PagerLink {
    pub number: u64,
    pub href: String,
    pub is_current: bool,
}

pub struct PagerView {
    pub links: Vec<PagerLink>,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
    pub from: u64,
    pub to: u64,
    pub total: u64,
}

impl PagerView {
    /// Build pager links for `meta`, preserving the search term and page size.
    pub fn build(meta: &PageMeta, base_path: &str, search_term: &str, limit: Option<&str>) -> Self {
        let href = |page: u64| page_href(base_path, page, search_term, limit);
        Self {
            links: meta
                .page_numbers()
                .into_iter()
                .map(|number| PagerLink {
                    number,
                    href: href(number),
                    is_current: number == meta.current_page,
                })
                .collect(),
            previous_href: meta.previous_page().map(href),
            next_href: meta.next_page().map(href),
            from: meta.from,
            to: meta.to,
            total: meta.total,
        }
    }
}

fn page_href(base_path: &str, page: u64, search_term: &str, limit: Option<&str>) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    let search_term = search_term.trim();
    if !search_term.is_empty() {
        query.append_pair("searchTerm", search_term);
    }
    if let Some(limit) = limit.map(str::trim).filter(|value| !value.is_empty()) {
        query.append_pair("limit", limit);
    }
    query.append_pair("page", &page.to_string());
    format!("{base_path}?{}", query.finish())
}

pub struct FeedView {
    pub heading: String,
    pub search_action: String,
    pub search_term: String,
    pub posts: Vec<PostCard>,
    pub pager: PagerView,
    pub empty_message: String,
    pub show_publish: bool,
}

impl FeedView {
    pub fn from_page(
        page: Page<PostWithAuthorRecord>,
        heading: impl Into<String>,
        base_path: &str,
        search_term: Option<&str>,
        limit: Option<&str>,
    ) -> Self {
        let search_term = search_term.unwrap_or_default().trim().to_string();
        let pager = PagerView::build(&page.meta, base_path, &search_term, limit);
        let empty_message = if search_term.is_empty() {
            "No posts yet.".to_string()
        } else {
            format!("No posts match “{search_term}”.")
        };

        Self {
            heading: heading.into(),
            search_action: base_path.to_string(),
            search_term,
            posts: page.items.into_iter().map(PostCard::from).collect(),
            pager,
            empty_message,
            show_publish: false,
        }
    }

    pub fn with_publish_actions(self) -> Self {
        Self {
            show_publish: true,
            ..self
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<FeedView>,
}

#[derive(Default)]
pub struct NewPostView {
    pub title: String,
    pub content: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "new_post.html")]
pub struct NewPostTemplate {
    pub view: LayoutContext<NewPostView>,
}

#[derive(Default)]
pub struct LoginView {
    pub email: String,
    pub next: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginView>,
}

#[derive(Default)]
pub struct RegisterView {
    pub name: String,
    pub username: String,
    pub email: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate {
    pub view: LayoutContext<RegisterView>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page Not Found".to_string(),
            message: "The page you requested does not exist.".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pagination::PageRequest;

    fn meta(total: u64, page: u64, per_page: u64) -> PageMeta {
        PageMeta::compute(total, PageRequest::new(page, per_page).expect("request"))
    }

    #[test]
    fn pager_links_keep_search_term() {
        let pager = PagerView::build(&meta(7, 2, 3), "/", "rust async", None);

        assert_eq!(pager.links.len(), 3);
        assert!(pager.links[1].is_current);
        assert_eq!(pager.links[0].href, "/?searchTerm=rust+async&page=1");
        assert_eq!(
            pager.next_href.as_deref(),
            Some("/?searchTerm=rust+async&page=3")
        );
        assert_eq!(
            pager.previous_href.as_deref(),
            Some("/?searchTerm=rust+async&page=1")
        );
    }

    #[test]
    fn blank_search_term_is_left_out_of_links() {
        let pager = PagerView::build(&meta(4, 1, 3), "/post/drafts", "  ", Some("3"));
        assert_eq!(pager.links[1].href, "/post/drafts?limit=3&page=2");
        assert!(pager.previous_href.is_none());
    }

    #[test]
    fn single_page_has_no_links() {
        let pager = PagerView::build(&meta(2, 1, 3), "/", "", None);
        assert!(pager.links.is_empty());
        assert!(pager.next_href.is_none());
    }

    #[test]
    fn long_content_is_shortened() {
        let long = "a".repeat(EXCERPT_CHARS + 10);
        let short = excerpt(&long);
        assert!(short.ends_with('…'));
        assert_eq!(short.chars().count(), EXCERPT_CHARS + 1);
        assert_eq!(excerpt("short"), "short");
    }
}
