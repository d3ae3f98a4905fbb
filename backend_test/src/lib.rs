use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one and inject dependencies.
///
/// Every test gets a fresh in-memory store behind a tracked client. Injectable dependencies
/// are [`rocket::local::asynchronous::Client`], `crate::model::store::memory::MemoryStore`
/// (sharing its tables with the client's store), and `crate::config::Config`.
///
/// `#[backend_test(voter)]` registers the example voter before the test runs.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract the injected arguments and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Register the example voter if needed.
    let maybe_register = match parse_macro_input!(args as Option<Ident>) {
        Some(arg) if arg == "voter" => quote! {
            {
                use crate::model::store::Store;
                store
                    .insert_voter(crate::model::db::NewVoter::example())
                    .await
                    .unwrap();
            }
        },
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected `voter` or no argument")
                .into_compile_error()
                .into();
        }
        None => quote! {},
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup() -> (
                rocket::local::asynchronous::Client,
                crate::model::store::memory::MemoryStore,
                crate::config::Config,
            ) {
                log4rs_test_utils::test_logging::init_logging_once_for(
                    ["evote_backend"],
                    None,
                    None,
                );

                let store = crate::model::store::memory::MemoryStore::default();
                let config = crate::config::Config::example();
                let handle = crate::model::store::StoreHandle::new(
                    std::sync::Arc::new(store.clone()),
                    config.store_timeout(),
                );
                let rocket_client = rocket::local::asynchronous::Client::tracked(
                    crate::rocket_for_store(handle, config.clone()),
                )
                .await
                .unwrap();

                #maybe_register

                (rocket_client, store, config)
            }

            /// The test itself.
            #item_fn

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                #[allow(unused_variables)]
                let (rocket_client, store, config) = setup().await;
                #new_name(#(#test_args),*).await
            });
        }
    }
    .into()
}

/// Run an asynchronous test against a fresh MongoDB database, dropped afterwards whether or
/// not the test passes.
///
/// The database is reached through `EVOTE_TEST_DB_URI` (a local replica set by default) and
/// has its indexes and ID counters prepared. Injectable dependencies are
/// `crate::model::mongodb::MongoStore` and [`mongodb::Database`], both backed by the same
/// database. These tests are ignored unless run with `--ignored`, as they need a server.
#[proc_macro_attribute]
pub fn mongo_test(_args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    let test_args = match check_mongo_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    quote! {
        #[test]
        #[ignore = "needs a MongoDB replica set"]
        fn #name() {
            /// Test setup.
            async fn setup() -> (crate::model::mongodb::MongoStore, mongodb::Database) {
                log4rs_test_utils::test_logging::init_logging_once_for(
                    ["evote_backend"],
                    None,
                    None,
                );

                let client = crate::model::mongodb::test_client().await;
                let db = client.database(&crate::model::mongodb::test_database_name());
                crate::model::mongodb::ensure_indexes_exist(&db).await.unwrap();
                crate::model::mongodb::ensure_counters_exist(
                    &crate::model::mongodb::Coll::from_db(&db),
                )
                .await
                .unwrap();
                (crate::model::mongodb::MongoStore::new(client, db.clone()), db)
            }

            /// The test itself.
            #item_fn

            /// Test cleanup.
            async fn cleanup(db: mongodb::Database) {
                db.drop(None).await.unwrap();
            }

            // Create an async runtime. We need a separate one for inside and
            // outside the `catch_unwind`.
            let outer_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("test-setup-cleanup")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            let inner_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("mongo-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            // Run the setup.
            let (store, db) = outer_runtime.block_on(setup());

            // Run the test, catching any panics.
            // Use mutexes to safely transfer `!UnwindSafe` data.
            let store_mutex = std::sync::Mutex::new(store);
            let db_mutex = std::sync::Mutex::new(db.clone());
            let runtime_mutex = std::sync::Mutex::new(inner_runtime);
            let result = std::panic::catch_unwind(|| {
                #[allow(unused_variables)]
                let store = store_mutex.into_inner().unwrap();
                #[allow(unused_variables)]
                let db = db_mutex.into_inner().unwrap();
                let runtime = runtime_mutex.into_inner().unwrap();

                runtime.block_on(#new_name(#(#test_args),*));
            });

            // Run the cleanup.
            outer_runtime.block_on(cleanup(db));

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::panic_any(cause);
            }
        }
    }
    .into()
}

/// Ensure a database test is async and takes only a `MongoStore` and/or a `Database`.
fn check_mongo_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_store = false;
    let mut has_db = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                if let Some(segment) = type_path.path.segments.last() {
                    let (seen, binding) = if segment.ident == "MongoStore" {
                        (&mut has_store, quote! { store })
                    } else if segment.ident == "Database" {
                        (&mut has_db, quote! { db })
                    } else {
                        break;
                    };
                    if *seen {
                        return Err(syn::Error::new(
                            input.span(),
                            format!("Test cannot accept more than one `{}`", segment.ident),
                        ));
                    }
                    *seen = true;
                    args.push(binding);
                    continue;
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected any of `store_ident: MongoStore` or `db_ident: Database`",
        ));
    }

    Ok(args)
}

/// Ensure the wrapped test is async, map its parameters onto the setup values, and reject
/// unknown or repeated parameters.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_store = false;
    let mut has_config = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                if let Some(segment) = type_path.path.segments.last() {
                    let (seen, binding) = if segment.ident == "Client" {
                        (&mut has_client, quote! { rocket_client })
                    } else if segment.ident == "MemoryStore" {
                        (&mut has_store, quote! { store })
                    } else if segment.ident == "Config" {
                        (&mut has_config, quote! { config })
                    } else {
                        return Err(unexpected(input));
                    };
                    if *seen {
                        return Err(syn::Error::new(
                            input.span(),
                            format!("Test cannot accept more than one `{}`", segment.ident),
                        ));
                    }
                    *seen = true;
                    args.push(binding);
                    continue;
                }
            }
        }

        return Err(unexpected(input));
    }

    Ok(args)
}

fn unexpected(input: &FnArg) -> syn::Error {
    syn::Error::new(
        input.span(),
        "Expected any of `client_ident: Client`, `store_ident: MemoryStore` or `config_ident: Config`",
    )
}
