//! Store operations against in-memory and failing backends.

#[cfg(test)]
mod tests {
    use crate::store::*;
    use crate::storage::{MemoryStore, StorageError};
    use crate::wheel::tests::tests::SequenceRng;
    use async_trait::async_trait;
    use futures::future::join_all;

    fn store() -> TemplateStore<MemoryStore> {
        TemplateStore::new(MemoryStore::new())
    }

    /// Reads fail, writes succeed or fail on demand.
    struct BrokenStore {
        fail_writes: bool,
    }

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn get_item(&self, _key: &str) -> crate::storage::Result<Option<String>> {
            Err(StorageError::Unavailable("disk gone".to_string()))
        }

        async fn set_item(&self, _key: &str, _value: &str) -> crate::storage::Result<()> {
            if self.fail_writes {
                Err(StorageError::Unavailable("read-only".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn find<'a>(templates: &'a [Template], name: &str) -> &'a Template {
        templates.iter().find(|t| t.name == name).unwrap()
    }

    #[tokio::test]
    async fn empty_store_seeds_default_template() {
        let store = store();
        assert!(store.list_templates().await.is_empty());

        let current = store.current_template().await.unwrap().unwrap();
        assert_eq!(current.name, "Default");
        assert_eq!(current.options.len(), 3);
        assert!(current
            .options
            .iter()
            .all(|o| o.enabled && o.kind == OptionKind::Text));
        let labels: Vec<_> = current.options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["Option 1", "Option 2", "Option 3"]);
        assert_eq!(store.current_template_id().await, current.id);
    }

    #[tokio::test]
    async fn ensure_initial_template_is_idempotent() {
        let store = store();
        let first = store.ensure_initial_template().await.unwrap();
        let second = store.ensure_initial_template().await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
        assert_eq!(store.list_templates().await, first);
    }

    #[tokio::test]
    async fn ensure_leaves_existing_collection_alone() {
        let store = store();
        store.create_template("Party").await.unwrap();
        let templates = store.ensure_initial_template().await.unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].name, "Party");
    }

    #[tokio::test]
    async fn create_template_becomes_current_with_fallback_name() {
        let store = store();
        let party = store.create_template("Party").await.unwrap();
        assert_eq!(store.current_template_id().await, party.id);

        let unnamed = store.create_template("").await.unwrap();
        assert_eq!(unnamed.name, "New Template");
        assert!(unnamed.options.is_empty());
        assert!(unnamed.hidden_option_ids.is_empty());
        assert_eq!(store.current_template_id().await, unnamed.id);

        let names: Vec<_> = store
            .list_templates()
            .await
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["Party", "New Template"]);

        let spaced = store.create_template("  ").await.unwrap();
        assert_eq!(spaced.name, "  ");
    }

    #[tokio::test]
    async fn records_without_ids_stay_addressable() {
        let backend = MemoryStore::with_items([(
            "jp.templates",
            r#"[{"name":"NoId","options":[{"label":"A","type":"text"}]}]"#,
        )]);
        let store = TemplateStore::new(backend);

        let first = store.list_templates().await;
        let second = store.list_templates().await;
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(first[0].options[0].id, second[0].options[0].id);

        let added = store
            .add_option(&first[0].id, NewOption::text("B"))
            .await
            .unwrap();
        assert!(added.is_some());

        let stored = store.list_templates().await;
        assert_eq!(stored[0].id, first[0].id);
        assert_eq!(stored[0].options.len(), 2);
        let raw = store
            .backend()
            .get_item("jp.templates")
            .await
            .unwrap()
            .unwrap();
        assert!(raw.contains(&format!("\"id\":\"{}\"", first[0].id)));
    }

    #[tokio::test]
    async fn sub_template_option_follows_target_renames() {
        let store = store();
        let party = store.create_template("Party").await.unwrap();
        let movies = store.create_template("Movies").await.unwrap();

        store
            .add_option(&party.id, NewOption::text("Pizza"))
            .await
            .unwrap();
        let link = store
            .add_option(&party.id, NewOption::sub_template(&movies.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(link.label, "Movies");
        assert_eq!(link.kind, OptionKind::SubTemplate);

        store.rename_template(&movies.id, "Film Night").await.unwrap();

        let templates = store.list_templates().await;
        assert_eq!(find(&templates, "Film Night").id, movies.id);
        let party = find(&templates, "Party");
        assert_eq!(party.option(&link.id).unwrap().label, "Film Night");
        assert_eq!(party.options[0].label, "Pizza");
    }

    #[tokio::test]
    async fn rename_relabels_every_reference_including_self_links() {
        let store = store();
        let a = store.create_template("A").await.unwrap();
        let b = store.create_template("B").await.unwrap();
        let c = store.create_template("C").await.unwrap();
        for owner in [&a, &b, &c] {
            store
                .add_option(&owner.id, NewOption::sub_template(&c.id))
                .await
                .unwrap();
        }

        store.rename_template(&c.id, "Zed").await.unwrap();

        let templates = store.list_templates().await;
        let links: Vec<_> = templates
            .iter()
            .flat_map(|t| t.options.iter())
            .filter(|o| o.sub_template_id == c.id)
            .collect();
        assert_eq!(links.len(), 3);
        assert!(links.iter().all(|o| o.label == "Zed"));
        assert_eq!(templates.iter().find(|t| t.id == c.id).unwrap().name, "Zed");
    }

    #[tokio::test]
    async fn editing_link_label_renames_the_target() {
        let store = store();
        let a = store.create_template("A").await.unwrap();
        let b = store.create_template("B").await.unwrap();
        let target = store.create_template("Movies").await.unwrap();
        let in_a = store
            .add_option(&a.id, NewOption::sub_template(&target.id))
            .await
            .unwrap()
            .unwrap();
        let in_b = store
            .add_option(&b.id, NewOption::sub_template(&target.id))
            .await
            .unwrap()
            .unwrap();

        let found = store
            .update_option(&a.id, &in_a.id, OptionPatch::new().label("Cinema"))
            .await
            .unwrap();
        assert!(found);

        let templates = store.list_templates().await;
        let by_id = |id: &str| templates.iter().find(|t| t.id == id).unwrap();
        assert_eq!(by_id(&target.id).name, "Cinema");
        assert_eq!(by_id(&a.id).option(&in_a.id).unwrap().label, "Cinema");
        assert_eq!(by_id(&b.id).option(&in_b.id).unwrap().label, "Cinema");
    }

    #[tokio::test]
    async fn editing_text_label_touches_nothing_else() {
        let store = store();
        let a = store.create_template("A").await.unwrap();
        let opt = store
            .add_option(&a.id, NewOption::text("Tacos"))
            .await
            .unwrap()
            .unwrap();
        store
            .update_option(&a.id, &opt.id, OptionPatch::new().label("A"))
            .await
            .unwrap();

        let templates = store.list_templates().await;
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].name, "A");
        assert_eq!(templates[0].options[0].label, "A");
    }

    #[tokio::test]
    async fn update_unknown_option_reports_false() {
        let store = store();
        let a = store.create_template("A").await.unwrap();
        assert!(!store
            .update_option(&a.id, "opt_missing", OptionPatch::new().enabled(false))
            .await
            .unwrap());
        assert!(!store
            .update_option("tpl_missing", "opt_missing", OptionPatch::new())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn add_option_validates_required_fields() {
        let store = store();
        let a = store.create_template("A").await.unwrap();

        let err = store
            .add_option(&a.id, NewOption::text("   "))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::MissingLabel)
        ));
        assert_eq!(err.to_string(), "Please enter option label");

        let err = store
            .add_option(&a.id, NewOption::sub_template(""))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::MissingSubTemplate)
        ));

        let err = store
            .add_option(&a.id, NewOption::sub_template("tpl_nowhere"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::SubTemplateNotFound(ref id)) if id == "tpl_nowhere"
        ));

        assert!(store.list_templates().await[0].options.is_empty());
    }

    #[tokio::test]
    async fn add_option_trims_label_and_ignores_unknown_template() {
        let store = store();
        let a = store.create_template("A").await.unwrap();
        let opt = store
            .add_option(&a.id, NewOption::text("  Sushi "))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(opt.label, "Sushi");
        assert!(opt.enabled);
        assert!(opt.id.starts_with("opt_"));

        assert!(store
            .add_option("tpl_missing", NewOption::text("x"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn self_reference_is_allowed() {
        let store = store();
        let party = store.create_template("Party").await.unwrap();
        let link = store
            .add_option(&party.id, NewOption::sub_template(&party.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(link.label, "Party");

        store.rename_template(&party.id, "Fiesta").await.unwrap();
        let t = store.list_templates().await.remove(0);
        assert_eq!(t.name, "Fiesta");
        assert_eq!(t.option(&link.id).unwrap().label, "Fiesta");
    }

    #[tokio::test]
    async fn delete_template_prunes_links_everywhere() {
        let store = store();
        let a = store.create_template("A").await.unwrap();
        let b = store.create_template("B").await.unwrap();
        let doomed = store.create_template("Doomed").await.unwrap();

        let link = store
            .add_option(&a.id, NewOption::sub_template(&doomed.id))
            .await
            .unwrap()
            .unwrap();
        store
            .set_hidden_option(&a.id, &link.id, true)
            .await
            .unwrap();
        store
            .add_option(&b.id, NewOption::sub_template(&doomed.id))
            .await
            .unwrap();
        store.add_option(&b.id, NewOption::text("Keep")).await.unwrap();

        store.delete_template(&doomed.id).await.unwrap();

        let templates = store.list_templates().await;
        assert_eq!(templates.len(), 2);
        assert!(templates
            .iter()
            .flat_map(|t| t.options.iter())
            .all(|o| !o.references(&doomed.id)));
        assert!(!find(&templates, "A").is_hidden(&link.id));
        assert_eq!(find(&templates, "B").options.len(), 1);
    }

    #[tokio::test]
    async fn deleting_current_template_repoints_to_first() {
        let store = store();
        let a = store.create_template("A").await.unwrap();
        let b = store.create_template("B").await.unwrap();
        assert_eq!(store.current_template_id().await, b.id);

        store.delete_template(&b.id).await.unwrap();
        assert_eq!(store.current_template_id().await, a.id);

        store.delete_template(&a.id).await.unwrap();
        assert_eq!(store.current_template_id().await, "");
        assert!(store.list_templates().await.is_empty());
    }

    #[tokio::test]
    async fn deleting_other_template_keeps_pointer() {
        let store = store();
        let a = store.create_template("A").await.unwrap();
        let b = store.create_template("B").await.unwrap();
        store.delete_template(&a.id).await.unwrap();
        assert_eq!(store.current_template_id().await, b.id);
    }

    #[tokio::test]
    async fn delete_option_removes_hidden_entry_only_locally() {
        let store = store();
        let a = store.create_template("A").await.unwrap();
        let b = store.create_template("B").await.unwrap();
        let opt = store
            .add_option(&a.id, NewOption::text("Pick me"))
            .await
            .unwrap()
            .unwrap();
        store
            .add_option(&b.id, NewOption::sub_template(&a.id))
            .await
            .unwrap();
        store.set_hidden_option(&a.id, &opt.id, true).await.unwrap();

        assert!(store.delete_option(&a.id, &opt.id).await.unwrap());
        assert!(!store.delete_option(&a.id, &opt.id).await.unwrap());

        let templates = store.list_templates().await;
        let a = find(&templates, "A");
        assert!(a.option(&opt.id).is_none());
        assert!(!a.is_hidden(&opt.id));
        assert_eq!(find(&templates, "B").options.len(), 1);
    }

    #[tokio::test]
    async fn toggling_excludes_option_from_wheel() {
        let store = store();
        let a = store.create_template("A").await.unwrap();
        let opt = store
            .add_option(&a.id, NewOption::text("Maybe"))
            .await
            .unwrap()
            .unwrap();

        assert!(store
            .toggle_option_enabled(&a.id, &opt.id, false)
            .await
            .unwrap());
        let t = store.current_template().await.unwrap().unwrap();
        assert!(!t.options[0].enabled);
        assert!(wheel::eligible_options(&t, false).is_empty());

        store
            .toggle_option_enabled(&a.id, &opt.id, true)
            .await
            .unwrap();
        let t = store.current_template().await.unwrap().unwrap();
        assert_eq!(wheel::eligible_options(&t, false).len(), 1);
    }

    #[tokio::test]
    async fn hidden_and_disabled_options_empty_the_wheel_until_reset() {
        let store = store();
        let x = store.create_template("X").await.unwrap();
        let a = store
            .add_option(&x.id, NewOption::text("A"))
            .await
            .unwrap()
            .unwrap();
        let b = store
            .add_option(&x.id, NewOption::text("B"))
            .await
            .unwrap()
            .unwrap();
        store.toggle_option_enabled(&x.id, &b.id, false).await.unwrap();
        store.set_hide_picked_enabled(true).await.unwrap();

        store.set_hidden_option(&x.id, &a.id, true).await.unwrap();
        store.set_hidden_option(&x.id, &a.id, true).await.unwrap();
        let t = store.current_template().await.unwrap().unwrap();
        assert_eq!(t.hidden_option_ids, vec![a.id.clone()]);
        assert!(wheel::eligible_options(&t, store.hide_picked_enabled().await).is_empty());

        store.clear_hidden_options(&x.id).await.unwrap();
        let t = store.current_template().await.unwrap().unwrap();
        let eligible = wheel::eligible_options(&t, true);
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, a.id);
    }

    #[tokio::test]
    async fn unhiding_absent_id_is_noop() {
        let store = store();
        let x = store.create_template("X").await.unwrap();
        store.set_hidden_option(&x.id, "ghost", false).await.unwrap();
        assert!(store.list_templates().await[0].hidden_option_ids.is_empty());
    }

    #[tokio::test]
    async fn stale_pointer_falls_back_to_first_template() {
        let store = store();
        let first = store.create_template("First").await.unwrap();
        store.create_template("Second").await.unwrap();

        store.set_current_template_id("nonexistent").await.unwrap();
        assert_eq!(store.current_template_id().await, "nonexistent");

        let current = store.current_template().await.unwrap().unwrap();
        assert_eq!(current.id, first.id);
    }

    #[tokio::test]
    async fn hide_picked_defaults_to_false() {
        let store = store();
        assert!(!store.hide_picked_enabled().await);
        store.set_hide_picked_enabled(true).await.unwrap();
        assert!(store.hide_picked_enabled().await);
        assert_eq!(
            store
                .backend()
                .get_item("jp.hidePickedEnabled")
                .await
                .unwrap()
                .as_deref(),
            Some("true")
        );
        store.set_hide_picked_enabled(false).await.unwrap();
        assert!(!store.hide_picked_enabled().await);
    }

    #[tokio::test]
    async fn saved_collection_lists_back_unchanged() {
        let store = store();
        let mut party = Template::new("tpl_party", "Party");
        party.options.push(WheelOption::text("opt_1", "Pizza"));
        party
            .options
            .push(WheelOption::sub_template("opt_2", "Movies", "tpl_movies"));
        party.hide("opt_1");
        let movies = Template::new("tpl_movies", "Movies");
        let templates = vec![party, movies];

        store.save_all_templates(&templates).await.unwrap();
        assert_eq!(store.list_templates().await, templates);
    }

    #[tokio::test]
    async fn corrupt_blob_reads_as_empty_and_reseeds() {
        let store = TemplateStore::new(MemoryStore::with_items([(
            "jp.templates",
            "[{\"id\": broken",
        )]));
        assert!(store.list_templates().await.is_empty());

        let current = store.current_template().await.unwrap().unwrap();
        assert_eq!(current.name, "Default");
    }

    #[tokio::test]
    async fn legacy_blob_is_upgraded_on_next_write() {
        let legacy = r#"[{"id":"tpl_old","name":"Old","options":[
            {"id":"opt_old","label":"Still here","type":"text","subTemplateId":""}
        ]}]"#;
        let store = TemplateStore::new(MemoryStore::with_items([("jp.templates", legacy)]));

        let t = store.current_template().await.unwrap().unwrap();
        assert_eq!(t.id, "tpl_old");
        assert!(t.options[0].enabled);

        store.clear_hidden_options("tpl_old").await.unwrap();
        let raw = store
            .backend()
            .get_item("jp.templates")
            .await
            .unwrap()
            .unwrap();
        assert!(raw.starts_with("{\"version\":1"));
    }

    #[tokio::test]
    async fn reorder_moves_within_template() {
        let store = store();
        let t = store.create_template("T").await.unwrap();
        let mut ids = Vec::new();
        for label in ["one", "two", "three"] {
            ids.push(
                store
                    .add_option(&t.id, NewOption::text(label))
                    .await
                    .unwrap()
                    .unwrap()
                    .id,
            );
        }

        assert!(store.reorder_option(&t.id, &ids[2], 0).await.unwrap());
        assert!(!store.reorder_option(&t.id, "opt_missing", 0).await.unwrap());
        assert!(!store.reorder_option("tpl_missing", &ids[0], 0).await.unwrap());

        let labels: Vec<_> = store.list_templates().await[0]
            .options
            .iter()
            .map(|o| o.label.clone())
            .collect();
        assert_eq!(labels, vec!["three", "one", "two"]);
    }

    #[tokio::test]
    async fn spin_records_pick_in_hide_mode() {
        let store = store();
        let t = store.create_template("T").await.unwrap();
        let a = store
            .add_option(&t.id, NewOption::text("A"))
            .await
            .unwrap()
            .unwrap();
        let b = store
            .add_option(&t.id, NewOption::text("B"))
            .await
            .unwrap()
            .unwrap();
        store.set_hide_picked_enabled(true).await.unwrap();

        let mut rng = SequenceRng::new(vec![1, 0]);
        let first = store.spin(&mut rng).await.unwrap().unwrap();
        assert_eq!(first.option.id, b.id);
        assert!(first.hidden);
        assert_eq!(first.remaining, 1);

        let second = store.spin(&mut rng).await.unwrap().unwrap();
        assert_eq!(second.option.id, a.id);
        assert_eq!(second.remaining, 0);

        assert!(store.spin(&mut rng).await.unwrap().is_none());

        store.clear_hidden_options(&t.id).await.unwrap();
        assert!(store.spin(&mut rng).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn spin_without_hide_mode_leaves_state_alone() {
        let store = store();
        let t = store.create_template("T").await.unwrap();
        store.add_option(&t.id, NewOption::text("Only")).await.unwrap();

        let mut rng = SequenceRng::new(vec![0]);
        for _ in 0..3 {
            let outcome = store.spin(&mut rng).await.unwrap().unwrap();
            assert!(!outcome.hidden);
            assert_eq!(outcome.remaining, 1);
        }
        assert!(store.list_templates().await[0].hidden_option_ids.is_empty());
    }

    #[tokio::test]
    async fn spin_offers_pivot_and_following_switches_template() {
        let store = store();
        let movies = store.create_template("Movies").await.unwrap();
        let party = store.create_template("Party").await.unwrap();
        store
            .add_option(&party.id, NewOption::sub_template(&movies.id))
            .await
            .unwrap();

        let mut rng = SequenceRng::new(vec![0]);
        let outcome = store.spin(&mut rng).await.unwrap().unwrap();
        assert_eq!(outcome.template_id, party.id);
        let pivot = outcome.pivot.clone().unwrap();
        assert_eq!(pivot.id, movies.id);
        assert_eq!(pivot.name, "Movies");

        assert!(store.follow_sub_template(&outcome).await.unwrap());
        assert_eq!(store.current_template_id().await, movies.id);

        store.delete_template(&movies.id).await.unwrap();
        assert!(!store.follow_sub_template(&outcome).await.unwrap());
    }

    #[tokio::test]
    async fn select_template_sets_one_shot_clear_flag() {
        let store = store();
        let a = store.create_template("A").await.unwrap();
        store.create_template("B").await.unwrap();

        assert!(!store.take_clear_result_flag().await.unwrap());
        store.select_template(&a.id).await.unwrap();
        assert_eq!(store.current_template_id().await, a.id);
        assert!(store.take_clear_result_flag().await.unwrap());
        assert!(!store.take_clear_result_flag().await.unwrap());

        store.set_clear_result_flag().await.unwrap();
        assert!(store.take_clear_result_flag().await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_mutations_do_not_lose_updates() {
        let store = store();
        let t = store.create_template("T").await.unwrap();

        let adds = (0..25).map(|i| store.add_option(&t.id, NewOption::text(format!("#{}", i))));
        let results = join_all(adds).await;
        assert!(results.iter().all(|r| r.is_ok()));

        assert_eq!(store.list_templates().await[0].options.len(), 25);
    }

    #[tokio::test]
    async fn unreadable_backend_degrades_to_defaults() {
        let store = TemplateStore::new(BrokenStore { fail_writes: false });
        assert!(store.list_templates().await.is_empty());
        assert_eq!(store.current_template_id().await, "");
        assert!(!store.hide_picked_enabled().await);
    }

    #[tokio::test]
    async fn failed_writes_surface_as_storage_errors() {
        let store = TemplateStore::new(BrokenStore { fail_writes: true });
        let err = store.create_template("A").await.unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));
        assert!(store.set_hide_picked_enabled(true).await.is_err());
    }

    #[tokio::test]
    async fn custom_namespace_isolates_keys() {
        let backend = MemoryStore::new();
        let store =
            TemplateStore::with_config(backend, StoreConfig::namespaced("guest.")).unwrap();
        store.ensure_initial_template().await.unwrap();

        assert!(store
            .backend()
            .get_item("guest.templates")
            .await
            .unwrap()
            .is_some());
        assert!(store
            .backend()
            .get_item("jp.templates")
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = StoreConfig {
            default_option_count: 0,
            ..Default::default()
        };
        let err = TemplateStore::with_config(MemoryStore::new(), config)
            .err()
            .unwrap();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn store_works_from_a_blocking_harness() {
        let store = store();
        let current = tokio_test::block_on(store.current_template()).unwrap().unwrap();
        assert_eq!(current.name, "Default");
    }
}
