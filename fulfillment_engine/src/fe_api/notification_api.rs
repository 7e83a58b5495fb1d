use crate::{
    db::traits::NotificationManagement,
    db_types::{Notification, Recipient},
    fe_api::FulfillmentError,
};

/// Read access to in-app notifications. Writing them is the dispatcher's job.
pub struct NotificationApi<B> {
    db: B,
}

impl<B> NotificationApi<B>
where B: NotificationManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn notifications_for(
        &self,
        recipient: &Recipient,
        unread_only: bool,
    ) -> Result<Vec<Notification>, FulfillmentError> {
        self.db.fetch_notifications(recipient, unread_only).await.map_err(Into::into)
    }

    pub async fn mark_read(&self, id: i64) -> Result<(), FulfillmentError> {
        match self.db.mark_notification_read(id).await.map_err(FulfillmentError::backend)? {
            true => Ok(()),
            false => Err(FulfillmentError::NotificationNotFound(id)),
        }
    }
}
