use std::future::Future;

use crate::{
    db_types::{NewNotification, Notification, Recipient},
    fe_api::FulfillmentError,
};

pub trait NotificationManagement {
    type Error: std::error::Error + Send + Sync + 'static + Into<FulfillmentError>;

    fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> impl Future<Output = Result<Notification, Self::Error>> + Send;

    /// Newest first.
    fn fetch_notifications(
        &self,
        recipient: &Recipient,
        unread_only: bool,
    ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send;

    /// Returns `false` if there is no notification with the given id.
    fn mark_notification_read(&self, id: i64) -> impl Future<Output = Result<bool, Self::Error>> + Send;
}
