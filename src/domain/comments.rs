use std::collections::HashMap;

use uuid::Uuid;

use crate::domain::entities::CommentRecord;

/// Group comments by their parent post and count them.
pub fn count_by_post<'a, I>(comments: I) -> HashMap<Uuid, u64>
where
    I: IntoIterator<Item = &'a CommentRecord>,
{
    let mut counts = HashMap::new();
    for comment in comments {
        *counts.entry(comment.post_id).or_insert(0) += 1;
    }
    counts
}
