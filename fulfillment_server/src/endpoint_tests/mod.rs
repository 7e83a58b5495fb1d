mod helpers;

mod operator_auth;
mod orders;
mod webhooks;
