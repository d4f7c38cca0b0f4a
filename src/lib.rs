mod config;
mod diagnostics;
mod error;
mod error_code;
mod formats;
mod future;
mod import;
mod ingest;
mod init_metrics;
mod init_tracing;
mod metadata;
mod middleware;
mod quota;
mod repo;
mod serde_str;
mod state;
mod store;
mod sync;
mod thumbnail;
mod tmp_file;
mod upload;

use std::marker::PhantomData;

use actix_form_data::{Field, Form, FormData, Multipart, Value};
use actix_web::{
    http::header::{CacheControl, CacheDirective},
    web::{self, Bytes, BytesMut},
    App, HttpRequest, HttpResponse, HttpServer,
};
use futures_util::{Stream, StreamExt};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::Instrument;
use tracing_actix_web::TracingLogger;

use self::{
    config::Configuration,
    error::{Error, UploadError},
    formats::classify,
    future::WithPollTimer,
    init_tracing::init_tracing,
    middleware::{Authenticated, Internal},
    repo::{
        CollectionId, CollectionRepo, FullRepo, Photo, PhotoId, PhotoRepo, PhotoUpdate, Role,
        User, UserId, UserRepo,
    },
    state::State,
    store::{file_store::FileStore, object_store::ObjectStore, Store},
};

const MEGABYTES: usize = 1024 * 1024;

/// Cached by clients for a day. Binaries never change once stored.
const CACHE_SECONDS: u32 = 60 * 60 * 24;

struct Upload<S>(Value<Bytes>, PhantomData<S>);

impl<S: Store + 'static> FormData for Upload<S> {
    type Item = Bytes;
    type Error = Error;

    fn form(req: &HttpRequest) -> Result<Form<Self::Item, Self::Error>, Self::Error> {
        // This form is expecting a single array field, 'images', each file read into memory
        let state = req
            .app_data::<web::Data<State<S>>>()
            .ok_or(UploadError::MissingState)?;

        Ok(Form::new()
            .max_files(state.config.server.max_file_count)
            .max_file_size(state.config.media.max_file_size * MEGABYTES)
            .transform_error(transform_error)
            .field(
                "images",
                Field::array(Field::file(move |filename, _, stream| {
                    metrics::counter!(crate::init_metrics::FILES).increment(1);

                    let span = tracing::info_span!("file-upload", ?filename);

                    Box::pin(
                        aggregate(stream)
                            .with_poll_timer("file-upload")
                            .instrument(span),
                    )
                })),
            ))
    }

    fn extract(value: Value<Self::Item>) -> Result<Self, Self::Error> {
        Ok(Upload(value, PhantomData))
    }
}

#[tracing::instrument(name = "Aggregate", skip(stream))]
async fn aggregate<St, E>(stream: St) -> Result<Bytes, Error>
where
    St: Stream<Item = Result<Bytes, E>>,
    Error: From<E>,
{
    futures_util::pin_mut!(stream);

    let mut buf = BytesMut::new();

    while let Some(bytes) = stream.next().await {
        buf.extend_from_slice(&bytes?);
    }

    tracing::debug!("Read {} bytes to memory", buf.len());

    Ok(buf.freeze())
}

async fn current_user<S>(state: &State<S>, id: UserId) -> Result<User, Error> {
    let user = state.repo.user(id).await?.ok_or(UploadError::MissingUser)?;

    Ok(user)
}

async fn owned_photo<S>(state: &State<S>, owner: UserId, id: PhotoId) -> Result<Photo, Error> {
    match state.repo.photo(id).await? {
        Some(photo) if photo.owner == owner && !photo.is_deleted() => Ok(photo),
        _ => Err(UploadError::MissingPhoto.into()),
    }
}

/// Handle responding to successful uploads
#[tracing::instrument(name = "Uploaded files", skip(value, state))]
async fn upload<S: Store + 'static>(
    Authenticated(user_id): Authenticated,
    Multipart(Upload(value, _)): Multipart<Upload<S>>,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let images = value
        .map()
        .and_then(|mut m| m.remove("images"))
        .and_then(|images| images.array())
        .ok_or(UploadError::NoFiles)?;

    let files = images
        .into_iter()
        .filter_map(|i| i.file())
        .map(|file| (file.filename, file.result))
        .collect::<Vec<_>>();

    let user = current_user(&state, user_id).await?;

    let collection = upload::upload_batch(&state, &user, files).await?;

    Ok(HttpResponse::Created().json(&serde_json::json!({
        "msg": "ok",
        "collection": collection,
    })))
}

#[tracing::instrument(name = "Fetching photo", skip(state))]
async fn photo<S>(
    Authenticated(user_id): Authenticated,
    id: web::Path<PhotoId>,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let photo = owned_photo(&state, user_id, id.into_inner()).await?;

    Ok(HttpResponse::Ok().json(&photo))
}

#[tracing::instrument(name = "Updating photo", skip(state))]
async fn update_photo<S>(
    Authenticated(user_id): Authenticated,
    id: web::Path<PhotoId>,
    update: web::Json<PhotoUpdate>,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let photo = owned_photo(&state, user_id, id.into_inner()).await?;

    let photo = state
        .repo
        .update_photo(photo.id, update.into_inner())
        .await?
        .ok_or(UploadError::MissingPhoto)?;

    Ok(HttpResponse::Ok().json(&photo))
}

#[tracing::instrument(name = "Deleting photo", skip(state))]
async fn delete_photo<S: Store + 'static>(
    Authenticated(user_id): Authenticated,
    id: web::Path<PhotoId>,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let photo = owned_photo(&state, user_id, id.into_inner()).await?;

    state
        .repo
        .soft_delete_photo(photo.id)
        .await?
        .ok_or(UploadError::MissingPhoto)?;

    if let Err(e) = state.store.delete(photo.id).await {
        tracing::warn!(
            "Failed to remove binaries of deleted photo {}: {}",
            photo.id,
            format!("{e}\n{e:?}")
        );
    }

    Ok(HttpResponse::NoContent().finish())
}

fn binary_response(media_type: mime::Mime, bytes: Bytes) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(media_type)
        .insert_header(CacheControl(vec![
            CacheDirective::Private,
            CacheDirective::MaxAge(CACHE_SECONDS),
        ]))
        .body(bytes)
}

#[tracing::instrument(name = "Serving image", skip(state))]
async fn serve_image<S: Store + 'static>(
    Authenticated(user_id): Authenticated,
    id: web::Path<PhotoId>,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let photo = owned_photo(&state, user_id, id.into_inner()).await?;

    let media_type = classify(&photo.descriptor.format)
        .map(|family| family.media_type())
        .unwrap_or(mime::APPLICATION_OCTET_STREAM);

    let bytes = state.store.load_image(photo.id).await?;

    Ok(binary_response(media_type, bytes))
}

#[tracing::instrument(name = "Serving thumbnail", skip(state))]
async fn serve_thumbnail<S: Store + 'static>(
    Authenticated(user_id): Authenticated,
    id: web::Path<PhotoId>,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let photo = owned_photo(&state, user_id, id.into_inner()).await?;

    let bytes = state.store.load_thumbnail(photo.id).await?;

    Ok(binary_response(mime::IMAGE_JPEG, bytes))
}

#[tracing::instrument(name = "Fetching collection", skip(state))]
async fn collection<S>(
    Authenticated(user_id): Authenticated,
    id: web::Path<CollectionId>,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    match state.repo.collection(id.into_inner()).await? {
        Some(collection) if collection.owner == user_id => Ok(HttpResponse::Ok().json(&collection)),
        _ => Err(UploadError::MissingCollection.into()),
    }
}

#[tracing::instrument(name = "Fetching collections", skip(state))]
async fn collections<S>(
    Authenticated(user_id): Authenticated,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let collections = state.repo.collections(user_id).await?;

    Ok(HttpResponse::Ok().json(&serde_json::json!({
        "msg": "ok",
        "collections": collections,
    })))
}

#[tracing::instrument(name = "Fetching user stats", skip(state))]
async fn user_stats<S>(
    Authenticated(user_id): Authenticated,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let user = current_user(&state, user_id).await?;
    let stats = state.repo.user_stats(user.id).await?;

    Ok(HttpResponse::Ok().json(&serde_json::json!({
        "msg": "ok",
        "stats": stats,
        "quota": user.role.quota,
    })))
}

#[derive(Debug, serde::Deserialize)]
struct UserBody {
    name: String,
    role: Role,
}

#[tracing::instrument(name = "Registering user", skip(state))]
async fn upsert_user<S>(
    id: web::Path<UserId>,
    body: web::Json<UserBody>,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let UserBody { name, role } = body.into_inner();

    let user = User {
        id: id.into_inner(),
        name,
        role,
    };

    state.repo.upsert_user(&user).await?;

    Ok(HttpResponse::Ok().json(&user))
}

#[tracing::instrument(name = "Fetching stats", skip(state))]
async fn stats<S>(state: web::Data<State<S>>) -> Result<HttpResponse, Error> {
    let stats = state.repo.stats().await?;

    Ok(HttpResponse::Ok().json(&serde_json::json!({
        "msg": "ok",
        "stats": stats,
    })))
}

async fn healthz<S: Store + 'static>(state: web::Data<State<S>>) -> Result<HttpResponse, Error> {
    state.repo.health_check().await?;
    state.store.health_check().await?;
    Ok(HttpResponse::Ok().finish())
}

fn transform_error(error: actix_form_data::Error) -> actix_web::Error {
    let error: Error = error.into();
    let error: actix_web::Error = error.into();
    error
}

fn configure_endpoints<S: Store + 'static>(config: &mut web::ServiceConfig, state: State<S>) {
    let api_key = state.config.server.api_key.clone();

    config
        .app_data(web::Data::new(state))
        .route("/healthz", web::get().to(healthz::<S>))
        .route("/stats", web::get().to(user_stats::<S>))
        .service(
            web::scope("/photos")
                .service(web::resource("").route(web::post().to(upload::<S>)))
                .service(
                    web::resource("/{id}")
                        .route(web::get().to(photo::<S>))
                        .route(web::patch().to(update_photo::<S>))
                        .route(web::delete().to(delete_photo::<S>)),
                )
                .service(web::resource("/{id}/image").route(web::get().to(serve_image::<S>)))
                .service(
                    web::resource("/{id}/thumbnail").route(web::get().to(serve_thumbnail::<S>)),
                ),
        )
        .service(
            web::scope("/collections")
                .service(web::resource("").route(web::get().to(collections::<S>)))
                .service(web::resource("/{id}").route(web::get().to(collection::<S>))),
        )
        .service(
            web::scope("/internal")
                .wrap(Internal(api_key))
                .service(web::resource("/users/{id}").route(web::put().to(upsert_user::<S>)))
                .service(web::resource("/stats").route(web::get().to(stats::<S>))),
        );
}

async fn launch<S>(state: State<S>) -> color_eyre::Result<()>
where
    S: Store + Send + 'static,
{
    let address = state.config.server.address;

    tracing::info!("Starting rawvault on {address}");

    HttpServer::new(move || {
        let state = state.clone();

        App::new()
            .wrap(TracingLogger::default())
            .configure(move |sc| configure_endpoints(sc, state))
    })
    .bind(address)?
    .run()
    .await?;

    Ok(())
}

/// A configured rawvault service, ready to install its subscribers and run
pub struct RawVaultConfiguration {
    config: Configuration,
}

impl RawVaultConfiguration {
    /// Build the rawvault configuration from commandline arguments
    ///
    /// This is probably not useful for 3rd party applications that handle their own commandline
    pub fn build_default() -> color_eyre::Result<Self> {
        Ok(RawVaultConfiguration {
            config: config::configure()?,
        })
    }

    /// Install the default rawvault tracer
    ///
    /// This is probably not useful for 3rd party applications that install their own tracing
    /// subscribers.
    pub fn install_tracing(self) -> color_eyre::Result<Self> {
        init_tracing(&self.config.tracing)?;
        Ok(self)
    }

    pub fn install_metrics(self) -> color_eyre::Result<Self> {
        if let Some(addr) = self.config.metrics.prometheus_address {
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()?;
            tracing::info!("Starting prometheus endpoint on {addr}");
        }

        init_metrics::init_metrics();

        Ok(self)
    }

    /// Run the rawvault application
    pub async fn run(self) -> color_eyre::Result<()> {
        let RawVaultConfiguration { config } = self;

        let repo = repo::open(&config.repo)?;

        match config.store.clone() {
            config::Store::Filesystem(config::Filesystem {
                image_path,
                thumbnail_path,
            }) => {
                let store = FileStore::build(image_path, thumbnail_path).await?;

                launch(State::build(config, repo, store).await?).await
            }
            config::Store::ObjectStorage(config::ObjectStorage {
                endpoint,
                use_path_style,
                image_bucket,
                thumbnail_bucket,
                region,
                access_key,
                secret_key,
                session_token,
            }) => {
                let store = ObjectStore::build(
                    store::object_store::ObjectStorage {
                        endpoint: &endpoint,
                        use_path_style,
                        region: &region,
                        access_key: &access_key,
                        secret_key: &secret_key,
                        session_token: session_token.as_deref(),
                    },
                    &image_bucket,
                    &thumbnail_bucket,
                )?;

                launch(State::build(config, repo, store).await?).await
            }
        }
    }
}
