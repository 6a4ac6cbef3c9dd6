//! RPC client construction and caching.
//!
//! [`ClientCache`] hands out one shared [`ReadClient`] per resolved chain ID and
//! builds a fresh [`SigningClient`] for every signing call. Provider
//! construction is delegated to a [`Connector`], so the transport can be
//! swapped without touching callers.

use std::sync::Arc;

use alloy_network::EthereumWallet;
use alloy_primitives::Address;
use alloy_provider::{DynProvider, Provider, ProviderBuilder, RootProvider};
use dashmap::DashMap;
use url::Url;

use super::registry::{ChainDescriptor, ChainRegistry, NetworkIdentifier};
use crate::error::Error;
use crate::signers::SecretKey;

/// Builds type-erased alloy providers for a chain endpoint.
///
/// Implementations must not perform network I/O while constructing.
pub trait Connector: Send + Sync {
    /// Builds a read-only provider.
    fn read_provider(&self, chain: &ChainDescriptor, endpoint: &Url) -> DynProvider;

    /// Builds a provider that signs and submits transactions with `wallet`.
    fn signing_provider(
        &self,
        chain: &ChainDescriptor,
        endpoint: &Url,
        wallet: EthereumWallet,
    ) -> DynProvider;
}

/// Production [`Connector`] speaking JSON-RPC over HTTP(S).
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnector;

impl Connector for HttpConnector {
    fn read_provider(&self, _chain: &ChainDescriptor, endpoint: &Url) -> DynProvider {
        RootProvider::new_http(endpoint.clone()).erased()
    }

    fn signing_provider(
        &self,
        _chain: &ChainDescriptor,
        endpoint: &Url,
        wallet: EthereumWallet,
    ) -> DynProvider {
        ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(endpoint.clone())
            .erased()
    }
}

/// Read-only client bound to one chain and endpoint.
pub struct ReadClient {
    /// Resolved chain ID.
    pub chain_id: u64,
    /// Endpoint the provider talks to.
    pub endpoint: Url,
    /// Underlying provider.
    pub provider: DynProvider,
}

/// Signing-capable client bound to one chain and one key-derived account.
pub struct SigningClient {
    /// Resolved chain ID.
    pub chain_id: u64,
    /// Endpoint the provider talks to.
    pub endpoint: Url,
    /// Account that signs submitted transactions.
    pub address: Address,
    /// Underlying wallet-backed provider.
    pub provider: DynProvider,
}

impl std::fmt::Debug for ReadClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadClient")
            .field("chain_id", &self.chain_id)
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for SigningClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningClient")
            .field("chain_id", &self.chain_id)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Memoized read clients keyed by resolved chain ID.
pub struct ClientCache {
    chains: ChainRegistry,
    endpoint_override: Option<Url>,
    connector: Arc<dyn Connector>,
    read_clients: DashMap<u64, Arc<ReadClient>>,
}

impl std::fmt::Debug for ClientCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCache")
            .field("endpoint_override", &self.endpoint_override)
            .field("cached", &self.cached_chain_ids())
            .finish_non_exhaustive()
    }
}

impl ClientCache {
    /// Creates an empty cache.
    ///
    /// `endpoint_override`, when set, replaces the registry endpoint for every
    /// chain.
    pub fn new(
        chains: ChainRegistry,
        endpoint_override: Option<Url>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            chains,
            endpoint_override,
            connector,
            read_clients: DashMap::new(),
        }
    }

    /// The chain registry used for resolution.
    pub const fn chains(&self) -> &ChainRegistry {
        &self.chains
    }

    /// Returns the cached read client for the resolved chain, constructing it
    /// on first use.
    ///
    /// # Errors
    ///
    /// Fails if the identifier does not resolve or the endpoint is malformed.
    pub fn read_client(&self, identifier: &NetworkIdentifier) -> Result<Arc<ReadClient>, Error> {
        let chain_id = self.chains.resolve(identifier)?;
        if let Some(client) = self.read_clients.get(&chain_id) {
            return Ok(Arc::clone(client.value()));
        }

        let endpoint = self.endpoint_for(chain_id)?;
        let chain = self.chains.describe(chain_id);
        let entry = self.read_clients.entry(chain_id).or_insert_with(|| {
            tracing::debug!(chain_id, %endpoint, "constructing read client");
            Arc::new(ReadClient {
                chain_id,
                provider: self.connector.read_provider(chain, &endpoint),
                endpoint: endpoint.clone(),
            })
        });
        Ok(Arc::clone(entry.value()))
    }

    /// Builds a new signing client for `secret` on the resolved chain.
    ///
    /// The key is parsed before anything else, so a malformed key never
    /// reaches the connector.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCredential`] for a malformed key, or a resolution error.
    pub fn signing_client(
        &self,
        secret: &SecretKey,
        identifier: &NetworkIdentifier,
    ) -> Result<SigningClient, Error> {
        let signer = secret.signer()?;
        let chain_id = self.chains.resolve(identifier)?;
        let endpoint = self.endpoint_for(chain_id)?;
        let address = signer.address();
        let provider = self.connector.signing_provider(
            self.chains.describe(chain_id),
            &endpoint,
            EthereumWallet::from(signer),
        );
        tracing::debug!(chain_id, %address, "constructed signing client");
        Ok(SigningClient {
            chain_id,
            endpoint,
            address,
            provider,
        })
    }

    /// Endpoint a client for `identifier` would be bound to.
    ///
    /// # Errors
    ///
    /// Fails if the identifier does not resolve.
    pub fn endpoint(&self, identifier: &NetworkIdentifier) -> Result<Url, Error> {
        self.endpoint_for(self.chains.resolve(identifier)?)
    }

    /// Chain IDs that currently hold a cached read client, ascending.
    pub fn cached_chain_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.read_clients.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    fn endpoint_for(&self, chain_id: u64) -> Result<Url, Error> {
        if let Some(url) = &self.endpoint_override {
            return Ok(url.clone());
        }
        let rpc_url = self.chains.describe(chain_id).rpc_url;
        Url::parse(rpc_url).map_err(|e| Error::config_with(format!("invalid RPC URL '{rpc_url}'"), e))
    }
}

/// Derives the account address for `secret` without touching the network.
///
/// # Errors
///
/// [`Error::InvalidCredential`] on malformed key material.
pub fn derive_address(secret: &SecretKey) -> Result<Address, Error> {
    secret.address()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use alloy_transport::mock::Asserter;

    use super::*;

    /// Connector backed by alloy's mocked transport; counts constructions.
    pub(crate) struct MockConnector {
        pub(crate) asserter: Asserter,
        pub(crate) reads: AtomicUsize,
        pub(crate) signings: AtomicUsize,
    }

    impl MockConnector {
        pub(crate) fn new() -> Self {
            Self {
                asserter: Asserter::new(),
                reads: AtomicUsize::new(0),
                signings: AtomicUsize::new(0),
            }
        }

        pub(crate) fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }

        pub(crate) fn signings(&self) -> usize {
            self.signings.load(Ordering::SeqCst)
        }
    }

    impl Connector for MockConnector {
        fn read_provider(&self, _chain: &ChainDescriptor, _endpoint: &Url) -> DynProvider {
            self.reads.fetch_add(1, Ordering::SeqCst);
            ProviderBuilder::new()
                .connect_mocked_client(self.asserter.clone())
                .erased()
        }

        fn signing_provider(
            &self,
            _chain: &ChainDescriptor,
            _endpoint: &Url,
            wallet: EthereumWallet,
        ) -> DynProvider {
            self.signings.fetch_add(1, Ordering::SeqCst);
            ProviderBuilder::new()
                .wallet(wallet)
                .connect_mocked_client(self.asserter.clone())
                .erased()
        }
    }

    pub(crate) fn mock_cache() -> (Arc<ClientCache>, Arc<MockConnector>) {
        let connector = Arc::new(MockConnector::new());
        let cache = ClientCache::new(
            ChainRegistry::new(),
            None,
            Arc::clone(&connector) as Arc<dyn Connector>,
        );
        (Arc::new(cache), connector)
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U64;

    use super::testing::mock_cache;
    use super::*;

    const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn read_clients_are_shared_per_chain() {
        let (cache, connector) = mock_cache();
        let first = cache.read_client(&"mainnet".into()).expect("mainnet");
        let second = cache.read_client(&NetworkIdentifier::Id(146)).expect("146");
        let third = cache.read_client(&"146".into()).expect("\"146\"");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &third));
        assert_eq!(connector.reads(), 1);

        let testnet = cache.read_client(&"testnet".into()).expect("testnet");
        assert!(!Arc::ptr_eq(&first, &testnet));
        assert_eq!(testnet.chain_id, 14601);
        assert_eq!(cache.cached_chain_ids(), vec![146, 14601]);
    }

    #[test]
    fn unresolvable_networks_construct_nothing() {
        let (cache, connector) = mock_cache();
        assert!(matches!(
            cache.read_client(&NetworkIdentifier::Id(1)),
            Err(Error::UnsupportedChain { .. })
        ));
        assert_eq!(connector.reads(), 0);
        assert!(cache.cached_chain_ids().is_empty());
    }

    #[test]
    fn endpoint_override_takes_precedence() {
        let override_url = Url::parse("http://localhost:8545").expect("url");
        let cache = ClientCache::new(
            ChainRegistry::new(),
            Some(override_url.clone()),
            Arc::new(HttpConnector),
        );
        assert_eq!(cache.endpoint(&"mainnet".into()).ok(), Some(override_url.clone()));
        let client = cache.read_client(&"testnet".into()).expect("client");
        assert_eq!(client.endpoint, override_url);

        let default = ClientCache::new(ChainRegistry::new(), None, Arc::new(HttpConnector));
        assert_eq!(
            default.endpoint(&"testnet".into()).ok().map(String::from),
            Some("https://rpc.testnet.soniclabs.com/".to_owned())
        );
    }

    #[test]
    fn signing_clients_are_never_shared() {
        let (cache, connector) = mock_cache();
        let secret = SecretKey::new(ANVIL_KEY);
        let first = cache.signing_client(&secret, &"testnet".into()).expect("first");
        let second = cache.signing_client(&secret, &"testnet".into()).expect("second");
        assert_eq!(first.address, second.address);
        assert_eq!(connector.signings(), 2);
        assert!(cache.cached_chain_ids().is_empty());
    }

    #[test]
    fn malformed_secret_constructs_no_client() {
        let (cache, connector) = mock_cache();
        let err = cache
            .signing_client(&SecretKey::new("0xdeadbeef"), &"testnet".into())
            .err()
            .expect("must fail");
        assert!(matches!(err, Error::InvalidCredential(_)));
        assert_eq!(connector.signings(), 0);
        assert!(matches!(
            derive_address(&SecretKey::new("nope")),
            Err(Error::InvalidCredential(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_first_access_yields_working_clients() {
        let (cache, connector) = mock_cache();
        let (a, b) = tokio::join!(
            {
                let cache = Arc::clone(&cache);
                async move { tokio::spawn(async move { cache.read_client(&"mainnet".into()) }).await }
            },
            {
                let cache = Arc::clone(&cache);
                async move { tokio::spawn(async move { cache.read_client(&"mainnet".into()) }).await }
            }
        );
        let a = a.expect("join a").expect("client a");
        let b = b.expect("join b").expect("client b");
        assert_eq!(a.chain_id, 146);
        assert_eq!(b.chain_id, 146);
        assert_eq!(cache.cached_chain_ids(), vec![146]);

        connector.asserter.push_success(&U64::from(100));
        connector.asserter.push_success(&U64::from(101));
        assert_eq!(a.provider.get_block_number().await.ok(), Some(100));
        assert_eq!(b.provider.get_block_number().await.ok(), Some(101));
    }
}
