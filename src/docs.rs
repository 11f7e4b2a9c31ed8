use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::auth::signup,
        crate::api::auth::login,
        crate::api::auth::logout,
        crate::api::auth::me,
        crate::api::auth::credits,
        crate::api::generate::generate,
        crate::api::generate::history,
        crate::api::generate::usage,
        crate::api::billing::checkout,
        crate::api::billing::verify,
        crate::api::stripe_webhook::stripe_webhook,
        crate::api::stripe_webhook::stripe_webhook_alias,
        crate::api::brands::list_brands,
        crate::api::brands::save_brand,
        crate::api::brands::delete_brand,
        crate::api::brands::default_brand,
        crate::api::templates::list_templates,
        crate::api::templates::save_template,
        crate::api::templates::delete_template,
        crate::api::subscriptions::current_subscription,
        crate::api::subscriptions::upgrade,
        crate::api::feedback::submit_feedback,
        crate::api::analytics::user_analytics,
        crate::api::analytics::admin_analytics,
        crate::api::batch::submit_batch,
        crate::api::batch::get_batch,
        crate::api::batch::list_batches,
        crate::api::export::export_pdf,
        crate::api::export::email_results,
        crate::api::health::health
    ),
    components(
        schemas(
            crate::generation::GenerationRequest,
            crate::generation::Property,
            crate::generation::StyleOptions,
            crate::generation::ComplianceOptions,
            crate::api::auth::CredentialsRequest,
            crate::api::auth::AuthResponse,
            crate::api::billing::CheckoutBody,
            crate::api::subscriptions::UpgradeRequest,
            crate::api::feedback::FeedbackRequest,
            crate::api::batch::BatchRequest,
            crate::api::export::ExportRequest,
            crate::api::export::ExportOutputs
        )
    ),
    tags(
        (name = "auth", description = "Accounts and sessions"),
        (name = "generation", description = "Listing copy generation"),
        (name = "billing", description = "Credit packs and Stripe checkout"),
        (name = "webhooks", description = "Callbacks from Stripe"),
        (name = "brands", description = "Brand voice presets"),
        (name = "templates", description = "Saved property templates"),
        (name = "subscriptions", description = "Plans and limits"),
        (name = "feedback", description = "Ratings on generated copy"),
        (name = "analytics", description = "Usage analytics"),
        (name = "batch", description = "Bulk generation"),
        (name = "export", description = "PDF export and email delivery"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_payment_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/billing/checkout"));
        assert!(doc.paths.paths.contains_key("/stripe/webhook"));
        assert!(doc.paths.paths.contains_key("/api/stripe/webhook"));
    }
}
