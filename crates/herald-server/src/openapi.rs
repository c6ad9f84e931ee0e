use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Herald API",
        version = "0.1.0",
        description = "RSS/Atom feed ingestion with scheduled refresh."
    ),
    paths(crate::routes::create_feed, crate::routes::health),
    components(schemas(
        crate::dto::CreateFeedRequest,
        crate::dto::CreateFeedResponse,
        crate::dto::FeedResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "feeds", description = "Feed registration"),
        (name = "system", description = "Health and system status"),
    )
)]
pub struct ApiDoc;
