use inkwell_core::db::open_db_in_memory;
use inkwell_core::model::{ArticlePatch, ArticleStatus, AuthorArticleFilter, NewArticle, Role};
use inkwell_core::{
    ArticleDraft, ArticleService, CoreError, Identity, MemoryCache, SqliteArticleRepository,
};
use rusqlite::{params, Connection};
use std::sync::Arc;

fn service(conn: &mut Connection) -> ArticleService<SqliteArticleRepository<'_>> {
    ArticleService::new(
        SqliteArticleRepository::try_new(conn, Arc::new(MemoryCache::new())).unwrap(),
    )
}

fn user(conn: &Connection, id: &str, role: Role) -> Identity {
    conn.execute(
        "INSERT INTO users (id, email, name, password, role, created_at, updated_at)
         VALUES (?1, ?1 || '@example.com', ?1, 'x', ?2, 1, 1);",
        params![id, role.as_str()],
    )
    .unwrap();
    Identity::new(id, role)
}

fn draft(title: &str, submit: bool) -> ArticleDraft {
    ArticleDraft {
        title: title.to_string(),
        content: format!("{title} body"),
        submit,
        ..ArticleDraft::default()
    }
}

#[test]
fn author_drafts_stay_private_until_submitted() {
    let mut conn = open_db_in_memory().unwrap();
    let alice = user(&conn, "alice", Role::User);
    let mut articles = service(&mut conn);

    let saved = articles
        .create_user_article(&alice, draft("Work in progress", false))
        .unwrap();
    assert_eq!(saved.status, ArticleStatus::Draft);
    assert_eq!(saved.author_id.as_deref(), Some("alice"));
    assert_eq!(saved.slug, "work-in-progress");
    assert!(matches!(
        articles.get_article(&saved.id).unwrap_err(),
        CoreError::NotFound { .. }
    ));

    let live = articles
        .create_user_article(&alice, draft("Ready", true))
        .unwrap();
    assert_eq!(live.status, ArticleStatus::Published);
    assert!(live.published_at.is_some());
    assert_eq!(articles.get_article(&live.id).unwrap().id, live.id);
}

#[test]
fn explicit_slug_wins_over_derived_one() {
    let mut conn = open_db_in_memory().unwrap();
    let alice = user(&conn, "alice", Role::User);
    let mut articles = service(&mut conn);

    let mut input = draft("Some Title", false);
    input.slug = Some("custom-slug".to_string());
    let created = articles.create_user_article(&alice, input).unwrap();
    assert_eq!(created.slug, "custom-slug");
}

#[test]
fn blank_title_or_content_is_rejected() {
    let mut conn = open_db_in_memory().unwrap();
    let alice = user(&conn, "alice", Role::User);
    let mut articles = service(&mut conn);

    let mut no_content = draft("Title", false);
    no_content.content = " ".to_string();
    for input in [draft("   ", false), no_content] {
        assert!(matches!(
            articles.create_user_article(&alice, input).unwrap_err(),
            CoreError::Validation(_)
        ));
    }
}

#[test]
fn only_the_owner_edits_or_deletes() {
    let mut conn = open_db_in_memory().unwrap();
    let alice = user(&conn, "alice", Role::User);
    let bob = user(&conn, "bob", Role::User);
    let admin = user(&conn, "root", Role::Admin);
    let mut articles = service(&mut conn);
    let id = articles
        .create_user_article(&alice, draft("Mine", false))
        .unwrap()
        .id;

    let patch = ArticlePatch {
        title: Some("Hijacked".to_string()),
        ..ArticlePatch::default()
    };
    for intruder in [&bob, &admin] {
        let err = articles
            .update_user_article(intruder, &id, patch.clone(), None, false)
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
        assert_eq!(err.status_code(), 403);
    }
    assert!(matches!(
        articles.delete_user_article(&bob, &id).unwrap_err(),
        CoreError::Forbidden(_)
    ));
    assert!(matches!(
        articles
            .update_user_article(&alice, "missing", patch.clone(), None, false)
            .unwrap_err(),
        CoreError::NotFound { .. }
    ));

    articles
        .update_user_article(&alice, &id, patch, None, false)
        .unwrap();
    assert_eq!(articles.get_own_article(&alice, &id).unwrap().title, "Hijacked");
    articles.delete_user_article(&alice, &id).unwrap();
    assert!(matches!(
        articles.get_own_article(&alice, &id).unwrap_err(),
        CoreError::NotFound { .. }
    ));
}

#[test]
fn authors_cannot_change_status_or_authorship_through_a_patch() {
    let mut conn = open_db_in_memory().unwrap();
    let alice = user(&conn, "alice", Role::User);
    user(&conn, "bob", Role::User);
    let mut articles = service(&mut conn);
    let id = articles
        .create_user_article(&alice, draft("Mine", false))
        .unwrap()
        .id;

    let patch = ArticlePatch {
        status: Some(ArticleStatus::Published),
        author_id: Some("bob".to_string()).into(),
        ..ArticlePatch::default()
    };
    articles
        .update_user_article(&alice, &id, patch, None, false)
        .unwrap();
    let article = articles.get_own_article(&alice, &id).unwrap();
    assert_eq!(article.status, ArticleStatus::Draft);
    assert_eq!(article.author_id.as_deref(), Some("alice"));

    articles
        .update_user_article(&alice, &id, ArticlePatch::default(), None, true)
        .unwrap();
    assert_eq!(articles.get_article(&id).unwrap().status, ArticleStatus::Published);
}

#[test]
fn moderation_is_admin_only_and_invalidates_the_cache() {
    let mut conn = open_db_in_memory().unwrap();
    let alice = user(&conn, "alice", Role::User);
    let admin = user(&conn, "root", Role::Admin);
    let mut articles = service(&mut conn);
    let id = articles
        .create_user_article(&alice, draft("Review me", true))
        .unwrap()
        .id;
    articles.get_article(&id).unwrap();

    assert!(matches!(
        articles.reject(&alice, &id).unwrap_err(),
        CoreError::Forbidden(_)
    ));
    articles.reject(&admin, &id).unwrap();
    assert!(matches!(
        articles.get_article(&id).unwrap_err(),
        CoreError::NotFound { .. }
    ));

    articles.publish(&admin, &id).unwrap();
    assert_eq!(articles.get_article(&id).unwrap().status, ArticleStatus::Published);
}

#[test]
fn admin_listings_and_pending_queue() {
    let mut conn = open_db_in_memory().unwrap();
    let alice = user(&conn, "alice", Role::User);
    let admin = user(&conn, "root", Role::Admin);
    let mut articles = service(&mut conn);

    let mut pending = NewArticle::new("Queued", "body");
    pending.status = ArticleStatus::Pending;
    let queued = articles.admin_create(&admin, pending, &[]).unwrap();
    assert_eq!(queued.slug, "queued");
    articles
        .create_user_article(&alice, draft("Draft", false))
        .unwrap();

    assert!(matches!(
        articles.list_pending(&alice, 1, 10).unwrap_err(),
        CoreError::Forbidden(_)
    ));
    let queue = articles.list_pending(&admin, 1, 10).unwrap();
    assert_eq!(queue.total, 1);
    assert_eq!(queue.items[0].id, queued.id);
    assert_eq!(articles.list_admin(&admin, None, 1, 10).unwrap().total, 2);

    let patch = ArticlePatch::status(ArticleStatus::Published);
    articles
        .admin_update(&admin, &queued.id, patch, Some(&[]))
        .unwrap();
    assert_eq!(articles.list_published(1, 10).unwrap().total, 1);

    articles.admin_delete(&admin, &queued.id).unwrap();
    assert_eq!(articles.list_admin(&admin, None, 1, 10).unwrap().total, 1);
}

#[test]
fn raw_page_input_is_normalized() {
    let mut conn = open_db_in_memory().unwrap();
    let alice = user(&conn, "alice", Role::User);
    let mut articles = service(&mut conn);
    for index in 0..12 {
        articles
            .create_user_article(&alice, draft(&format!("Post {index}"), true))
            .unwrap();
    }

    let page = articles.list_published(0, -5).unwrap();
    assert_eq!(page.page, 1);
    assert_eq!(page.page_size, 10);
    assert_eq!(page.items.len(), 10);
    assert_eq!(page.total, 12);

    let capped = articles.list_published(1, 10_000).unwrap();
    assert_eq!(capped.page_size, 100);
    assert_eq!(capped.items.len(), 12);

    let mine = articles
        .list_mine(&alice, &AuthorArticleFilter::default(), 2, 10)
        .unwrap();
    assert_eq!(mine.items.len(), 2);
}

#[test]
fn blank_search_is_a_validation_error() {
    let mut conn = open_db_in_memory().unwrap();
    let alice = user(&conn, "alice", Role::User);
    let mut articles = service(&mut conn);
    articles
        .create_user_article(&alice, draft("Findable", true))
        .unwrap();

    let err = articles.search("   ", 1, 10).unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    assert_eq!(err.status_code(), 400);
    assert_eq!(articles.search("findable", 1, 10).unwrap().total, 1);
}
