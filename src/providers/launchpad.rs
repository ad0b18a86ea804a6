use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use tracing::info;

sol! {
    #[sol(rpc)]
    interface ILaunchpad {
        function socialMint(address _creator, string memory _name, string memory _symbol) external;
        function setBotAuthority(address _botAuthority) external;
    }
}

/// Mints launchpad tokens through the relayer wallet.
#[async_trait]
pub trait TokenMinter: Send + Sync {
    /// Submit a mint and wait for the receipt. Returns the transaction hash.
    async fn mint(&self, creator: &str, name: &str, symbol: &str) -> Result<String, anyhow::Error>;
    async fn setup_authority(&self) -> Result<(), anyhow::Error>;
    fn relayer_address(&self) -> String;
}

pub struct Launchpad<P: Provider + Clone> {
    provider: P,
    address: Address,
    relayer: Address,
}

/// Connect the relayer wallet to the launchpad contract over HTTP RPC.
pub fn connect(
    rpc_url: &str,
    private_key: &str,
    contract: Address,
) -> Result<Launchpad<impl Provider + Clone>, anyhow::Error> {
    let signer: PrivateKeySigner = private_key
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid relayer private key: {}", e))?;
    let relayer = signer.address();
    let wallet = EthereumWallet::from(signer);

    let url: Url = rpc_url
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid RPC URL: {}", e))?;
    let provider = ProviderBuilder::new().wallet(wallet).connect_http(url);

    info!("Relayer wallet {} connected to launchpad {}", relayer, contract);
    Ok(Launchpad {
        provider,
        address: contract,
        relayer,
    })
}

#[async_trait]
impl<P: Provider + Clone> TokenMinter for Launchpad<P> {
    async fn mint(&self, creator: &str, name: &str, symbol: &str) -> Result<String, anyhow::Error> {
        let creator: Address = creator
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid creator address: {}", e))?;

        let contract = ILaunchpad::new(self.address, &self.provider);
        let pending = contract
            .socialMint(creator, name.to_string(), symbol.to_string())
            .send()
            .await?;
        let receipt = pending.get_receipt().await?;

        if !receipt.status() {
            anyhow::bail!("Mint transaction {} reverted", receipt.transaction_hash);
        }
        Ok(receipt.transaction_hash.to_string())
    }

    async fn setup_authority(&self) -> Result<(), anyhow::Error> {
        let contract = ILaunchpad::new(self.address, &self.provider);
        let pending = contract.setBotAuthority(self.relayer).send().await?;
        let receipt = pending.get_receipt().await?;

        if !receipt.status() {
            anyhow::bail!("Authority transaction {} reverted", receipt.transaction_hash);
        }
        info!("Relayer registered as the contract's bot authority");
        Ok(())
    }

    fn relayer_address(&self) -> String {
        self.relayer.to_string()
    }
}
