use http::Method;

use super::types::{Category, CategoryDraft, CategoryId};
use crate::client::{ApiClient, RequestOptions};
use crate::error::Error;

#[derive(Debug, Clone, Copy)]
pub struct Categories<'a> {
    client: &'a ApiClient,
}

impl<'a> Categories<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<Category>, Error> {
        self.client
            .fetch_list("/categories", RequestOptions::default())
            .await
    }

    pub async fn get(&self, id: CategoryId) -> Result<Category, Error> {
        self.client
            .fetch(Method::GET, &path(id), RequestOptions::default())
            .await
    }

    pub async fn create(&self, draft: &CategoryDraft) -> Result<Category, Error> {
        self.client
            .submit(Method::POST, "/categories", draft, RequestOptions::default())
            .await
    }

    pub async fn update(&self, id: CategoryId, draft: &CategoryDraft) -> Result<Category, Error> {
        self.client
            .submit(Method::PUT, &path(id), draft, RequestOptions::default())
            .await
    }

    pub async fn delete(&self, id: CategoryId) -> Result<(), Error> {
        self.client.perform(Method::DELETE, &path(id)).await
    }
}

fn path(id: CategoryId) -> String {
    format!("/categories/{id}")
}
