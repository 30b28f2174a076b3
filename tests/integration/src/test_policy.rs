//! Bucket policy integration tests.

#[cfg(test)]
mod tests {
    use cask_core::auth::AuthContext;
    use cask_core::error::CaskError;
    use cask_core::policy::{Decision, Policy, evaluate};

    use crate::{seed_bucket, test_cask, test_owner};

    fn parse_policy(json: &str) -> Policy {
        serde_json::from_str(json).unwrap_or_else(|e| panic!("failed to parse policy: {e}"))
    }

    #[tokio::test]
    async fn test_should_apply_policy_parsed_from_json_document() {
        let cask = test_cask();
        let bucket = seed_bucket(&cask, "json").await;

        let policy = parse_policy(
            r#"{
                "Version": "2012-10-17",
                "Statement": [
                    {
                        "Effect": "Allow",
                        "Principal": ["user:reader"],
                        "Action": ["object:get"],
                        "Resource": ["docs/*"]
                    }
                ]
            }"#,
        );

        let version = cask
            .set_bucket_policy(&test_owner(), &bucket.id, policy)
            .await
            .expect("set policy");
        assert_eq!(version, 1);

        let stored = cask.get_bucket_policy(&bucket.id).await.expect("get policy");
        assert_eq!(stored.version, "2012-10-17");
        assert_eq!(stored.statement.len(), 1);

        let reader = AuthContext::user("reader");
        cask.authorize(&reader, &bucket.id, "object:get", "docs/intro.md")
            .await
            .expect("reader allowed");

        let err = cask
            .authorize(&reader, &bucket.id, "object:put", "docs/intro.md")
            .await
            .unwrap_err();
        assert!(matches!(err, CaskError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_should_let_deny_win_over_allow_anywhere_in_document() {
        let cask = test_cask();
        let bucket = seed_bucket(&cask, "deny").await;

        // the broad allow comes first; the narrow deny still wins
        let policy = parse_policy(
            r#"{
                "Version": "2012-10-17",
                "Statement": [
                    {
                        "Effect": "Allow",
                        "Principal": ["user:bob"],
                        "Action": ["*"],
                        "Resource": ["files/*"]
                    },
                    {
                        "Effect": "Deny",
                        "Principal": ["user:bob"],
                        "Action": ["*"],
                        "Resource": ["files/payroll.xlsx"]
                    }
                ]
            }"#,
        );
        cask.set_bucket_policy(&test_owner(), &bucket.id, policy)
            .await
            .expect("set policy");

        let bob = AuthContext::user("bob");
        cask.authorize(&bob, &bucket.id, "object:get", "files/notes.txt")
            .await
            .expect("plain read allowed");
        cask.authorize(&bob, &bucket.id, "object:delete", "files/notes.txt")
            .await
            .expect("wildcard action allowed");

        let err = cask
            .authorize(&bob, &bucket.id, "object:get", "files/payroll.xlsx")
            .await
            .unwrap_err();
        assert!(matches!(err, CaskError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_should_match_resources_per_path_segment() {
        let cask = test_cask();
        let bucket = seed_bucket(&cask, "glob").await;

        let policy = parse_policy(
            r#"{
                "Version": "2012-10-17",
                "Statement": [
                    {
                        "Effect": "Allow",
                        "Principal": ["user:ops"],
                        "Action": ["object:get"],
                        "Resource": ["logs/*", "metrics-?.csv"]
                    }
                ]
            }"#,
        );
        cask.set_bucket_policy(&test_owner(), &bucket.id, policy)
            .await
            .expect("set policy");

        let ops = AuthContext::user("ops");

        // trailing /* covers arbitrarily deep keys
        cask.authorize(&ops, &bucket.id, "object:get", "logs/app.log")
            .await
            .expect("shallow log allowed");
        cask.authorize(&ops, &bucket.id, "object:get", "logs/2026/08/app.log")
            .await
            .expect("deep log allowed");

        // ? matches exactly one character within a segment
        cask.authorize(&ops, &bucket.id, "object:get", "metrics-1.csv")
            .await
            .expect("single digit allowed");
        let err = cask
            .authorize(&ops, &bucket.id, "object:get", "metrics-10.csv")
            .await
            .unwrap_err();
        assert!(matches!(err, CaskError::Forbidden { .. }));

        // a bare prefix without the slash is a different name, not a match
        let err = cask
            .authorize(&ops, &bucket.id, "object:get", "logstash")
            .await
            .unwrap_err();
        assert!(matches!(err, CaskError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_should_keep_audit_trail_across_actors() {
        let cask = test_cask();
        let bucket = seed_bucket(&cask, "audit").await;

        let first = parse_policy(
            r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Principal":["public"],"Action":["object:get"],"Resource":["site/*"]}]}"#,
        );
        let second = parse_policy(
            r#"{"Version":"2012-10-17","Statement":[{"Effect":"Deny","Principal":["public"],"Action":["*"],"Resource":["site/*"]}]}"#,
        );

        cask.set_bucket_policy(&test_owner(), &bucket.id, first)
            .await
            .expect("owner sets v1");
        cask.set_bucket_policy(&AuthContext::admin("secops"), &bucket.id, second)
            .await
            .expect("admin sets v2");

        let history = cask.policy_history(&bucket.id).await.expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].version, 1);
        assert_eq!(history[0].actor, "user:owner");
        assert_eq!(history[1].version, 2);
        assert_eq!(history[1].actor, "user:secops");

        // the bucket record reflects the latest version
        let record = cask.get_bucket(&bucket.id).await.expect("bucket");
        assert_eq!(record.policy_version, 2);
    }

    #[tokio::test]
    async fn test_should_restrict_policy_management_to_owner_and_admin() {
        let cask = test_cask();
        let bucket = seed_bucket(&cask, "mgmt").await;

        let policy = parse_policy(
            r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Principal":["user:mallory"],"Action":["*"],"Resource":["*"]}]}"#,
        );

        let err = cask
            .set_bucket_policy(&AuthContext::user("mallory"), &bucket.id, policy.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, CaskError::Forbidden { .. }));

        // the failed attempt leaves no trace
        assert!(cask.get_bucket_policy(&bucket.id).await.is_err());
        assert!(cask.policy_history(&bucket.id).await.expect("history").is_empty());

        cask.set_bucket_policy(&AuthContext::admin("root"), &bucket.id, policy)
            .await
            .expect("admin allowed");
    }

    #[test]
    fn test_should_default_to_deny_without_policy() {
        assert_eq!(evaluate(None, "user:any", "object:get", "k"), Decision::Deny);
    }
}
