mod authenticated;
mod internal;

pub(crate) use authenticated::Authenticated;
pub(crate) use internal::Internal;

#[cfg(test)]
pub(crate) use authenticated::USER_HEADER;
