//! Post operation payloads.

use serde::{Deserialize, Serialize};

/// A blog post as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Public resource id (`post-*`).
    #[serde(rename = "postID")]
    pub post_id: String,
    /// Resource id of the owning user.
    #[serde(rename = "userID")]
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostResponse {
    #[serde(rename = "postID")]
    pub post_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    #[serde(rename = "postID")]
    pub post_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdatePostResponse {}

/// Deletes a batch of the caller's posts. Absent ids are not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePostRequest {
    #[serde(rename = "postIDs")]
    pub post_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeletePostResponse {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPostRequest {
    #[serde(rename = "postID")]
    pub post_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPostResponse {
    pub post: Post,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPostsRequest {
    #[serde(default)]
    pub offset: i64,
    /// 0 means "unset"; the dispatcher fills the default page size.
    #[serde(default)]
    pub limit: i64,
    /// Optional exact-match title filter.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPostsResponse {
    /// Total matching rows, ignoring the pagination window.
    pub total_count: i64,
    pub posts: Vec<Post>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<T>(val: &T) -> T
    where
        T: Serialize + serde::de::DeserializeOwned,
    {
        let bytes = rmp_serde::to_vec_named(val).expect("serialize");
        rmp_serde::from_slice(&bytes).expect("deserialize")
    }

    #[test]
    fn post_roundtrip() {
        let post = Post {
            post_id: "post-00000a".to_string(),
            user_id: "user-000001".to_string(),
            title: "Hello".to_string(),
            content: "First post.".to_string(),
            created_at: 1_700_000_000_000,
            updated_at: 1_700_000_000_000,
        };
        assert_eq!(roundtrip(&post), post);
    }

    #[test]
    fn post_ids_serialize_with_upper_id_suffix() {
        let rq = DeletePostRequest {
            post_ids: vec!["post-000001".to_string()],
        };
        let json = serde_json::to_value(&rq).expect("to json");
        assert!(json.get("postIDs").is_some());
    }

    #[test]
    fn list_posts_request_title_filter_roundtrip() {
        let rq = ListPostsRequest {
            offset: 0,
            limit: 10,
            title: Some("Hello".to_string()),
        };
        assert_eq!(roundtrip(&rq), rq);
    }

    #[test]
    fn update_post_request_unset_fields_roundtrip() {
        let rq = UpdatePostRequest {
            post_id: "post-000001".to_string(),
            title: None,
            content: Some("edited".to_string()),
        };
        assert_eq!(roundtrip(&rq), rq);
    }
}
