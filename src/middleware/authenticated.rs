use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpRequest};

use crate::{
    error::{Error, UploadError},
    repo::UserId,
};

pub(crate) const USER_HEADER: &str = "x-user-id";

/// Identity asserted by the upstream auth proxy
#[derive(Clone, Copy, Debug)]
pub(crate) struct Authenticated(pub(crate) UserId);

fn user_id(req: &HttpRequest) -> Option<UserId> {
    req.headers()
        .get(USER_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

impl FromRequest for Authenticated {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            user_id(req)
                .map(Authenticated)
                .ok_or_else(|| UploadError::Unauthenticated.into()),
        )
    }
}
