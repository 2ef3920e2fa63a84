use std::io;
use std::io::ErrorKind;
use std::sync::Arc;

use anyhow::anyhow;
use lazy_static::lazy_static;
use ntex::util::stream_recv;
use ntex::web;
use ntex::web::HttpRequest;
use ntex_files::NamedFile;
use ntex_multipart::{Field, Multipart};
use regex::Regex;
use serde::{Deserialize, Serialize};
use spdlog::info;

use crate::analytics::{VisitPublisher, VisitSender, VisitTracker};
use crate::config::Config;
use crate::date_utils::format_date_time;
use crate::export::{expand_names, export_archive, export_post};
use crate::import::{confirm_batch, preview_batch, ImportRecord, UploadedFile};
use crate::paginator::Paginator;
use crate::query_string::QueryString;
use crate::slug::slug_from_text;
use crate::store::memory::MemoryStore;
use crate::store::{PostRecord, Store};

struct AppState {
    config: Config,
    store: Arc<dyn Store>,
    visits: VisitSender,
}

#[derive(Deserialize)]
struct ConfirmRequest {
    posts: Vec<ImportRecord>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostSummary {
    slug: String,
    title: String,
    excerpt: Option<String>,
    published: bool,
    featured: bool,
    created_at: String,
    category: Option<String>,
    tags: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostListResponse {
    posts: Vec<PostSummary>,
    page: u32,
    page_count: u32,
    total: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostDetail {
    id: String,
    slug: String,
    title: String,
    content: String,
    excerpt: Option<String>,
    published: bool,
    featured: bool,
    created_at: String,
    category: Option<String>,
    tags: Vec<String>,
}

struct Disposition {
    name: Option<String>,
    filename: Option<String>,
}

fn parse_disposition(header: &str) -> Disposition {
    lazy_static! {
        static ref NAME_REGEX: Regex = Regex::new(r#"(?:^|;)\s*name="(?P<value>[^"]*)""#).unwrap();
        static ref FILENAME_REGEX: Regex = Regex::new(r#"filename="(?P<value>[^"]*)""#).unwrap();
    }

    let capture = |regex: &Regex| {
        regex
            .captures(header)
            .and_then(|cap| cap.name("value").map(|v| v.as_str().to_string()))
    };

    Disposition {
        name: capture(&NAME_REGEX),
        filename: capture(&FILENAME_REGEX),
    }
}

fn content_disposition(field: &Field) -> Option<Disposition> {
    let header = field.headers().get("content-disposition")?;
    Some(parse_disposition(header.to_str().ok()?))
}

/// Drains the multipart payload, keeping every file of the `files` field.
async fn read_uploaded_files(mut payload: Multipart) -> anyhow::Result<Vec<UploadedFile>> {
    let mut files = vec![];

    while let Some(item) = stream_recv(&mut payload).await {
        let mut field = item.map_err(|e| anyhow!("Invalid multipart payload: {}", e))?;

        let Some(disposition) = content_disposition(&field) else {
            continue;
        };
        if disposition.name.as_deref() != Some("files") {
            continue;
        }
        let Some(file_name) = disposition.filename else {
            continue;
        };

        let mut data = Vec::new();
        while let Some(chunk) = stream_recv(&mut field).await {
            let chunk = chunk.map_err(|e| anyhow!("Error reading uploaded file {}: {}", file_name, e))?;
            data.extend_from_slice(&chunk);
        }

        files.push(UploadedFile { name: file_name, data });
    }

    Ok(files)
}

#[web::post("/api/import/preview")]
async fn import_preview(payload: Multipart, state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    let files = match read_uploaded_files(payload).await {
        Ok(files) => files,
        Err(e) => return web::HttpResponse::BadRequest().body(e.to_string()),
    };

    if files.is_empty() {
        return web::HttpResponse::BadRequest().body("No files submitted under the 'files' field");
    }

    match preview_batch(state.store.as_ref(), &files) {
        Ok(report) => {
            info!("Previewed {} files: {} valid, {} conflicting", report.total, report.valid, report.conflicting);
            web::HttpResponse::Ok().json(&report)
        }
        Err(e) => web::HttpResponse::InternalServerError()
            .body(format!("Error building import preview: {}", e)),
    }
}

#[web::post("/api/import/confirm")]
async fn import_confirm(body: web::types::Json<ConfirmRequest>, state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    if body.posts.is_empty() {
        return web::HttpResponse::BadRequest().body("No posts submitted");
    }

    let report = confirm_batch(state.store.as_ref(), &body.posts);
    info!("Import finished: {} imported, {} failed", report.imported, report.failed);

    // The batch counts as successful when at least one record made it in
    if report.imported > 0 {
        web::HttpResponse::Ok().json(&report)
    } else {
        web::HttpResponse::BadRequest().json(&report)
    }
}

fn summarize(store: &dyn Store, post: &PostRecord) -> anyhow::Result<PostSummary> {
    let (category, tags) = expand_names(store, post)?;
    Ok(PostSummary {
        slug: post.slug.clone(),
        title: post.title.clone(),
        excerpt: post.excerpt.clone(),
        published: post.published,
        featured: post.featured,
        created_at: format_date_time(&post.created_at),
        category,
        tags,
    })
}

fn matches_filters(store: &dyn Store, post: &PostRecord, category: Option<&str>, tag: Option<&str>) -> anyhow::Result<bool> {
    if let Some(wanted) = category {
        let wanted = slug_from_text(wanted);
        let actual = match post.category_id {
            Some(ref id) => store.get_category(id)?.map(|c| c.slug),
            None => None,
        };
        if actual.as_deref() != Some(wanted.as_str()) {
            return Ok(false);
        }
    }

    if let Some(wanted) = tag {
        let wanted = slug_from_text(wanted);
        let mut found = false;
        for id in &post.tag_ids {
            if let Some(tag) = store.get_tag(id)? {
                if tag.slug == wanted {
                    found = true;
                    break;
                }
            }
        }
        if !found {
            return Ok(false);
        }
    }

    Ok(true)
}

#[web::get("/api/posts")]
async fn list_posts(req: HttpRequest, state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    let qs = req.uri().query().map(QueryString::from).unwrap_or_default();
    let store = state.store.as_ref();

    let mut posts = match store.list_posts() {
        Ok(posts) => posts,
        Err(e) => return web::HttpResponse::InternalServerError().body(format!("Error listing posts: {}", e)),
    };

    if qs.filter("category").is_some() || qs.filter("tag").is_some() {
        let mut filtered = Vec::with_capacity(posts.len());
        for post in posts {
            match matches_filters(store, &post, qs.filter("category"), qs.filter("tag")) {
                Ok(true) => filtered.push(post),
                Ok(false) => {}
                Err(e) => return web::HttpResponse::InternalServerError().body(format!("Error listing posts: {}", e)),
            }
        }
        posts = filtered;
    }

    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let paginator = Paginator::new(&posts, state.config.defaults.page_size);
    let cur_page = match qs.page() { // Sanity check for current page
        x if x > paginator.page_count() => 1,
        x => x,
    };

    let page = match paginator.page(cur_page) {
        Ok(page) => page,
        Err(err_desc) => return web::HttpResponse::InternalServerError().body(err_desc),
    };

    let mut summaries = Vec::with_capacity(page.items.len());
    for post in page.items {
        match summarize(store, post) {
            Ok(summary) => summaries.push(summary),
            Err(e) => return web::HttpResponse::InternalServerError().body(format!("Error listing posts: {}", e)),
        }
    }

    web::HttpResponse::Ok().json(&PostListResponse {
        posts: summaries,
        page: page.number,
        page_count: page.page_count,
        total: page.total,
    })
}

fn request_origin(req: &HttpRequest) -> String {
    match req.headers().get("x-forwarded-for") {
        Some(v) => v.to_str().unwrap_or("unknown").to_string(),
        None => "local".to_string(),
    }
}

#[web::get("/api/posts/{slug}")]
async fn view_post(req: HttpRequest, path: web::types::Path<String>, state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    let slug = path.into_inner();
    let store = state.store.as_ref();

    let post = match store.find_post_by_slug(&slug) {
        Ok(Some(post)) => post,
        Ok(None) => return web::HttpResponse::NotFound().body(format!("Post {} not found", slug)),
        Err(e) => return web::HttpResponse::InternalServerError().body(format!("Error loading post {}: {}", slug, e)),
    };

    let (category, tags) = match expand_names(store, &post) {
        Ok(expanded) => expanded,
        Err(e) => return web::HttpResponse::InternalServerError().body(format!("Error loading post {}: {}", slug, e)),
    };

    state.visits.view(post.slug.clone(), request_origin(&req)).await;

    web::HttpResponse::Ok().json(&PostDetail {
        id: post.id.0.clone(),
        slug: post.slug.clone(),
        title: post.title.clone(),
        content: post.content.clone(),
        excerpt: post.excerpt.clone(),
        published: post.published,
        featured: post.featured,
        created_at: format_date_time(&post.created_at),
        category,
        tags,
    })
}

#[web::get("/api/posts/{slug}/export")]
async fn export_single(path: web::types::Path<String>, state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    let slug = path.into_inner();

    match export_post(state.store.as_ref(), &slug) {
        Ok(Some(document)) => web::HttpResponse::Ok()
            .content_type("text/markdown; charset=utf-8")
            .header("Content-Disposition", format!("attachment; filename=\"{}.md\"", slug))
            .body(document),
        Ok(None) => web::HttpResponse::NotFound().body(format!("Post {} not found", slug)),
        Err(e) => web::HttpResponse::InternalServerError().body(format!("Error exporting post {}: {}", slug, e)),
    }
}

#[web::get("/api/export.tar.gz")]
async fn export_all(state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    match export_archive(state.store.as_ref()) {
        Ok(archive) => web::HttpResponse::Ok()
            .content_type("application/gzip")
            .header("Content-Disposition", "attachment; filename=\"posts-export.tar.gz\"")
            .body(ntex::util::Bytes::from(archive)),
        Err(e) => web::HttpResponse::InternalServerError().body(format!("Error exporting posts: {}", e)),
    }
}

#[web::get("/public/{file_name}")]
async fn public_files(path: web::types::Path<String>, state: web::types::State<Arc<AppState>>) -> Result<NamedFile, web::Error> {
    if path.contains("../") {
        return Err(web::error::ErrorUnauthorized("Access forbidden").into());
    }

    let file_path = state.config.paths.public_dir.join(path.into_inner());

    Ok(NamedFile::open(file_path)?)
}

pub async fn server_run(config: Config) -> io::Result<()> {
    let visits = match config.metrics {
        Some(ref metrics) => {
            let publisher = VisitPublisher::new(&metrics.location).map_err(|e| {
                io::Error::new(ErrorKind::Other, format!("Error setting up visit tracking: {}", e))
            })?;
            VisitTracker::new(publisher).new_sender()
        }
        None => VisitTracker::no_op(),
    };

    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());

    let bind_addr = config.server.address.clone();
    let bind_port = config.server.port;
    let app_state = Arc::new(AppState {
        config,
        store,
        visits,
    });

    info!("Starting server on {}:{}", bind_addr, bind_port);

    web::HttpServer::new(move || {
        web::App::new()
            .state(app_state.clone())
            .service(import_preview)
            .service(import_confirm)
            .service(list_posts)
            .service(view_post)
            .service(export_single)
            .service(export_all)
            .service(public_files)
    })
        .bind((bind_addr, bind_port))?
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_disposition() {
        let disposition = parse_disposition(r#"form-data; name="files"; filename="my-post.md""#);

        // `name=` must not match the tail of `filename=`
        assert_eq!(disposition.name.as_deref(), Some("files"));
        assert_eq!(disposition.filename.as_deref(), Some("my-post.md"));

        let no_file = parse_disposition(r#"form-data; name="comment""#);
        assert_eq!(no_file.name.as_deref(), Some("comment"));
        assert!(no_file.filename.is_none());
    }
}
