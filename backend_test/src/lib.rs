use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one and inject its
/// dependencies.
///
/// By default every test gets a fresh in-memory store and a server over it
/// that accepts the test reCAPTCHA response. Injectable dependencies are
/// [`rocket::local::asynchronous::Client`] and `crate::model::kv::MemoryKv`,
/// the latter being a handle onto the same store the server writes to.
///
/// `#[backend_test(mongodb)]` swaps the in-memory store for a `MongoKv` over
/// a throwaway database on the server named by `db_uri`, which is dropped
/// however the test terminates. Such tests inject `MongoKv` instead of
/// `MemoryKv`, and are ignored unless run with `cargo test -- --ignored`.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    let mongodb = match parse_macro_input!(args as Option<Ident>) {
        None => false,
        Some(arg) if arg == "mongodb" => true,
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected no argument or `mongodb`")
                .into_compile_error()
                .into();
        }
    };
    let store_type = if mongodb { "MongoKv" } else { "MemoryKv" };

    // Extract parameters and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone(), store_type) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    if mongodb {
        mongodb_test(name, new_name, item_fn, test_args)
    } else {
        memory_test(name, new_name, item_fn, test_args)
    }
    .into()
}

fn memory_test(
    name: Ident,
    new_name: Ident,
    item_fn: ItemFn,
    test_args: Vec<TokenStream2>,
) -> TokenStream2 {
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup() -> (rocket::local::asynchronous::Client, crate::model::kv::MemoryKv) {
                let store = crate::model::kv::MemoryKv::new();
                let rocket = crate::rocket_for_store_and_gate(
                    std::sync::Arc::new(store.clone()),
                    std::sync::Arc::new(crate::verification::TestGate),
                );
                let rocket_client = rocket::local::asynchronous::Client::tracked(rocket)
                    .await
                    .unwrap();
                (rocket_client, store)
            }

            /// The test itself.
            #item_fn

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                #[allow(unused_variables)]
                let (rocket_client, store) = setup().await;
                #new_name(#(#test_args),*).await;
            });
        }
    }
}

fn mongodb_test(
    name: Ident,
    new_name: Ident,
    item_fn: ItemFn,
    test_args: Vec<TokenStream2>,
) -> TokenStream2 {
    quote! {
        #[test]
        #[ignore = "needs a MongoDB server at `db_uri`"]
        fn #name() {
            /// Test setup.
            async fn setup() -> (
                rocket::local::asynchronous::Client,
                crate::model::mongodb::MongoKv,
                mongodb::Database,
            ) {
                let db_uri = rocket::Config::figment()
                    .extract_inner::<String>("db_uri")
                    .expect("`db_uri` not set");
                let db_client = mongodb::Client::with_uri_str(&db_uri).await.unwrap();
                let db = db_client.database(&format!(
                    "test_{}",
                    crate::model::poll::PollId::random()
                ));
                let store = crate::model::mongodb::MongoKv::new(&db);
                let rocket = crate::rocket_for_store_and_gate(
                    std::sync::Arc::new(store.clone()),
                    std::sync::Arc::new(crate::verification::TestGate),
                );
                let rocket_client = rocket::local::asynchronous::Client::tracked(rocket)
                    .await
                    .unwrap();
                (rocket_client, store, db)
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
                .thread_name("rocket-worker-test-thread")
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();

            let (rocket_client, store, db) = outer_runtime.block_on(setup());

            // Run the test, catching any panics.
            // Use mutexes to safely transfer `!UnwindSafe` data.
            let client_mutex = std::sync::Mutex::new(rocket_client);
            let store_mutex = std::sync::Mutex::new(store);
            let runtime_mutex = std::sync::Mutex::new(inner_runtime);
            let result = std::panic::catch_unwind(|| {
                #[allow(unused_variables)]
                let rocket_client = client_mutex.into_inner().unwrap();
                #[allow(unused_variables)]
                let store = store_mutex.into_inner().unwrap();
                let runtime = runtime_mutex.into_inner().unwrap();

                runtime.block_on(#new_name(#(#test_args),*));
            });

            outer_runtime.block_on(cleanup(db));

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::resume_unwind(cause);
            }
        }
    }
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature, store_type: &str) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_store = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                // The last path segment names the type whether or not it is qualified.
                if let Some(segment) = type_path.path.segments.last() {
                    if segment.ident == "Client" {
                        if has_client {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `rocket::local::asynchronous::Client`",
                            ));
                        }
                        has_client = true;
                        args.push(quote! { rocket_client });
                        continue;
                    } else if segment.ident == store_type {
                        if has_store {
                            return Err(syn::Error::new(
                                input.span(),
                                format!("Test cannot accept more than one `{store_type}`"),
                            ));
                        }
                        has_store = true;
                        args.push(quote! { store });
                        continue;
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            format!("Expected one of `client_ident: Client` or `store_ident: {store_type}`"),
        ));
    }

    Ok(args)
}
