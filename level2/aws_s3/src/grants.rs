use portfolio_lib::PolicyStatement;

use crate::BucketOutputs;

pub const BUCKET_READ_ACTIONS: &[&str] = &["s3:GetObject*", "s3:GetBucket*", "s3:List*"];

pub const BUCKET_PUT_ACTIONS: &[&str] = &[
    "s3:PutObject",
    "s3:PutObjectLegalHold",
    "s3:PutObjectRetention",
    "s3:PutObjectTagging",
    "s3:PutObjectVersionTagging",
    "s3:Abort*",
];

pub const BUCKET_DELETE_ACTIONS: &[&str] = &["s3:DeleteObject*"];

/// read and write objects, list the bucket. Deleting objects is granted
/// separately by [`grant_delete`].
pub fn grant_read_write(bucket: &BucketOutputs) -> PolicyStatement {
    PolicyStatement::allow(BUCKET_READ_ACTIONS.iter().chain(BUCKET_PUT_ACTIONS).copied())
        .on(bucket.arn())
        .on(bucket.arn_for_objects("*"))
}

pub fn grant_delete(bucket: &BucketOutputs) -> PolicyStatement {
    PolicyStatement::allow(BUCKET_DELETE_ACTIONS.iter().copied()).on(bucket.arn_for_objects("*"))
}
