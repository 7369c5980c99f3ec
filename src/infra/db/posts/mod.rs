mod read;
mod types;
mod write;

use sqlx::{Postgres, QueryBuilder};

use crate::application::repos::PostFilter;

use super::PostgresRepositories;

/// Columns of a post joined with its author and optional group.
const POST_SUMMARY_SELECT: &str = "SELECT p.id, p.text, p.created_at, p.author_id, p.image, \
     u.username AS author_username, \
     g.id AS group_id, g.slug AS group_slug, g.title AS group_title \
     FROM posts p \
     INNER JOIN users u ON u.id = p.author_id \
     LEFT JOIN groups g ON g.id = p.group_id \
     WHERE 1=1 ";

impl PostgresRepositories {
    fn apply_post_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: PostFilter) {
        match filter {
            PostFilter::All => {}
            PostFilter::Group(group_id) => {
                qb.push(" AND p.group_id = ");
                qb.push_bind(group_id);
            }
            PostFilter::Author(author_id) => {
                qb.push(" AND p.author_id = ");
                qb.push_bind(author_id);
            }
            PostFilter::FollowedBy(user_id) => {
                qb.push(
                    " AND EXISTS (SELECT 1 FROM follows f WHERE f.author_id = p.author_id AND f.user_id = ",
                );
                qb.push_bind(user_id);
                qb.push(")");
            }
        }
    }
}
