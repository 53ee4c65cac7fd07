use actix_web::{error, web, HttpResponse};
use prometheus::{Encoder, Registry, TextEncoder};

pub async fn metrics(registry: web::Data<Registry>) -> Result<HttpResponse, actix_web::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    encoder
        .encode(&registry.gather(), &mut buffer)
        .map_err(error::ErrorInternalServerError)?;
    Ok(HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer))
}
