//! Documents and request builders for the four blog operations.
//!
//! The documents mirror what the schema code generator emits for the
//! `BlogPost` model; the backend owns the schema and these strings must stay
//! in step with it.

use serde_json::json;

use crate::error::Result;
use crate::message::GraphQLRequest;
use crate::model::{CreateBlogPostInput, DeleteBlogPostInput, PostId, UpdateBlogPostInput};

pub const LIST_BLOG_POSTS: &str = "listBlogPosts";
pub const CREATE_BLOG_POST: &str = "createBlogPost";
pub const UPDATE_BLOG_POST: &str = "updateBlogPost";
pub const DELETE_BLOG_POST: &str = "deleteBlogPost";

pub const LIST_BLOG_POSTS_QUERY: &str = r#"query ListBlogPosts(
  $filter: ModelBlogPostFilterInput
  $limit: Int
  $nextToken: String
) {
  listBlogPosts(filter: $filter, limit: $limit, nextToken: $nextToken) {
    items {
      id
      title
      content
      owner
      createdAt
      updatedAt
    }
    nextToken
  }
}"#;

pub const CREATE_BLOG_POST_MUTATION: &str = r#"mutation CreateBlogPost(
  $input: CreateBlogPostInput!
  $condition: ModelBlogPostConditionInput
) {
  createBlogPost(input: $input, condition: $condition) {
    id
    title
    content
    owner
    createdAt
    updatedAt
  }
}"#;

pub const UPDATE_BLOG_POST_MUTATION: &str = r#"mutation UpdateBlogPost(
  $input: UpdateBlogPostInput!
  $condition: ModelBlogPostConditionInput
) {
  updateBlogPost(input: $input, condition: $condition) {
    id
    title
    content
    owner
    createdAt
    updatedAt
  }
}"#;

pub const DELETE_BLOG_POST_MUTATION: &str = r#"mutation DeleteBlogPost(
  $input: DeleteBlogPostInput!
  $condition: ModelBlogPostConditionInput
) {
  deleteBlogPost(input: $input, condition: $condition) {
    id
  }
}"#;

/// Build a `ListBlogPosts` request for one page
pub fn list_blog_posts(limit: Option<u32>, next_token: Option<&str>) -> Result<GraphQLRequest> {
    GraphQLRequest::new(
        LIST_BLOG_POSTS_QUERY,
        "ListBlogPosts",
        json!({ "limit": limit, "nextToken": next_token }),
    )
}

pub fn create_blog_post(title: &str, content: &str) -> Result<GraphQLRequest> {
    let input = CreateBlogPostInput {
        title: title.to_string(),
        content: content.to_string(),
    };
    GraphQLRequest::new(CREATE_BLOG_POST_MUTATION, "CreateBlogPost", json!({ "input": input }))
}

pub fn update_blog_post(id: &PostId, title: &str, content: &str) -> Result<GraphQLRequest> {
    let input = UpdateBlogPostInput {
        id: id.clone(),
        title: title.to_string(),
        content: content.to_string(),
    };
    GraphQLRequest::new(UPDATE_BLOG_POST_MUTATION, "UpdateBlogPost", json!({ "input": input }))
}

pub fn delete_blog_post(id: &PostId) -> Result<GraphQLRequest> {
    let input = DeleteBlogPostInput { id: id.clone() };
    GraphQLRequest::new(DELETE_BLOG_POST_MUTATION, "DeleteBlogPost", json!({ "input": input }))
}
