use axum::async_trait;
use diesel::prelude::*;

use crate::error::ServerError;
use crate::models::{NewPost, PostChanges, PostRow};
use crate::schema::posts::dsl::{created, post_id, posts, user_id};
use crate::schema::profiles;
use crate::service::ServiceState;

/// A feed row: the post plus its author's display name and photo.
pub type FeedRow = (PostRow, Option<String>, Option<String>);

#[async_trait]
pub trait PostRepository {
    async fn create_post(&self, post: NewPost) -> Result<PostRow, ServerError>;
    async fn get_post(&self, id: i64) -> Result<Option<PostRow>, ServerError>;
    async fn update_post(&self, id: i64, changes: PostChanges) -> Result<(), ServerError>;
    async fn delete_post(&self, id: i64) -> Result<(), ServerError>;
    async fn feed(&self, limit: i64, offset: i64) -> Result<Vec<FeedRow>, ServerError>;
    async fn posts_by(&self, author: i64) -> Result<Vec<FeedRow>, ServerError>;
}

#[async_trait]
impl PostRepository for ServiceState {
    async fn create_post(&self, post: NewPost) -> Result<PostRow, ServerError> {
        let mut db = self.db_pool.get()?;
        let inserted = diesel::insert_into(posts)
            .values(&post)
            .returning(PostRow::as_returning())
            .get_result(&mut db)?;
        Ok(inserted)
    }

    async fn get_post(&self, id: i64) -> Result<Option<PostRow>, ServerError> {
        let mut db = self.db_pool.get()?;
        let post = posts
            .filter(post_id.eq(id))
            .select(PostRow::as_select())
            .get_result(&mut db)
            .optional()?;
        Ok(post)
    }

    async fn update_post(&self, id: i64, changes: PostChanges) -> Result<(), ServerError> {
        let mut db = self.db_pool.get()?;
        diesel::update(posts.filter(post_id.eq(id)))
            .set(&changes)
            .execute(&mut db)?;
        Ok(())
    }

    async fn delete_post(&self, id: i64) -> Result<(), ServerError> {
        let mut db = self.db_pool.get()?;
        diesel::delete(posts.filter(post_id.eq(id))).execute(&mut db)?;
        Ok(())
    }

    async fn feed(&self, limit: i64, offset: i64) -> Result<Vec<FeedRow>, ServerError> {
        let mut db = self.db_pool.get()?;
        let rows = posts
            .inner_join(profiles::table)
            .order(created.desc())
            .limit(limit)
            .offset(offset)
            .select((
                PostRow::as_select(),
                profiles::display_name,
                profiles::photo_path,
            ))
            .load(&mut db)?;
        Ok(rows)
    }

    async fn posts_by(&self, author: i64) -> Result<Vec<FeedRow>, ServerError> {
        let mut db = self.db_pool.get()?;
        let rows = posts
            .inner_join(profiles::table)
            .filter(user_id.eq(author))
            .order(created.desc())
            .select((
                PostRow::as_select(),
                profiles::display_name,
                profiles::photo_path,
            ))
            .load(&mut db)?;
        Ok(rows)
    }
}
