//! Inline ABI bindings for the native-yield contracts.
//!
//! Only the functions and events the automation touches are declared.

use alloy::sol;

sol! {
    /// Per-provider state stored by the YieldManager.
    #[derive(Debug)]
    struct YieldProviderStorage {
        uint8 yieldProviderVendor;
        bool isStakingPaused;
        bool isOssificationInitiated;
        bool isOssified;
        address primaryEntrypoint;
        address ossifiedEntrypoint;
        uint96 yieldProviderIndex;
        uint256 userFunds;
        uint256 yieldReportedCumulative;
        uint256 lstLiabilityPrincipal;
        uint256 lastReportedNegativeYield;
    }

    /// YieldManager: routes reserve funds between the rollup and yield providers.
    #[sol(rpc)]
    #[derive(Debug)]
    interface IYieldManager {
        function L1_MESSAGE_SERVICE() external view returns (address);
        function getTotalSystemBalance() external view returns (uint256);
        function getEffectiveTargetWithdrawalReserve() external view returns (uint256);
        function withdrawableValue(address yieldProvider) external view returns (uint256);
        function isStakingPaused(address yieldProvider) external view returns (bool);
        function isOssificationInitiated(address yieldProvider) external view returns (bool);
        function isOssified(address yieldProvider) external view returns (bool);
        function getYieldProviderData(address yieldProvider) external view returns (YieldProviderStorage memory);

        function fundYieldProvider(address yieldProvider, uint256 amount) external;
        function safeAddToWithdrawalReserve(address yieldProvider, uint256 amount) external;
        function pauseStaking(address yieldProvider) external;
        function unpauseStaking(address yieldProvider) external;
        function reportYield(address yieldProvider, address l2YieldRecipient)
            external returns (uint256 newReportedYield, uint256 outstandingNegativeYield);
        function progressPendingOssification(address yieldProvider) external returns (bool isOssificationComplete);
        function unstake(address yieldProvider, bytes calldata withdrawalParams) external payable;

        event NativeYieldReported(
            address indexed yieldProvider,
            address indexed l2YieldRecipient,
            uint256 yieldAmount,
            uint256 outstandingNegativeYield
        );
        event WithdrawalReserveAugmented(
            address indexed yieldProvider,
            uint256 requestedAmount,
            uint256 reserveIncrementAmount
        );
    }

    /// LazyOracle: publishes merkle-rooted vault report trees.
    #[sol(rpc)]
    #[derive(Debug)]
    interface ILazyOracle {
        function latestReportData()
            external view returns (uint256 timestamp, uint256 refSlot, bytes32 treeRoot, string memory reportCid);
        function updateVaultData(
            address vault,
            uint256 totalValue,
            uint256 cumulativeLidoFees,
            uint256 liabilityShares,
            uint256 maxLiabilityShares,
            uint256 slashingReserve,
            bytes32[] calldata proof
        ) external;

        event VaultsReportDataUpdated(
            uint256 indexed timestamp,
            uint256 indexed refSlot,
            bytes32 indexed root,
            string cid
        );
    }

    /// Last report applied to a vault.
    #[derive(Debug)]
    struct VaultHubReport {
        uint104 totalValue;
        int104 inOutDelta;
        uint48 timestamp;
    }

    /// VaultHub: vault connection, freshness and fee settlement.
    #[sol(rpc)]
    #[derive(Debug)]
    interface IVaultHub {
        function isReportFresh(address vault) external view returns (bool);
        function isVaultConnected(address vault) external view returns (bool);
        function settleableLidoFeesValue(address vault) external view returns (uint256);
        function latestReport(address vault) external view returns (VaultHubReport memory);

        event VaultRebalanced(address indexed vault, uint256 sharesBurned, uint256 etherWithdrawn);
        event LidoFeesSettled(
            address indexed vault,
            uint256 transferred,
            uint256 cumulativeLidoFees,
            uint256 settledLidoFees
        );
    }

    /// Yield extension exposed by the rollup contract.
    #[sol(rpc)]
    #[derive(Debug)]
    interface ILineaRollupYieldExtension {
        function transferFundsForNativeYield(uint256 amount) external;
    }

    /// Lido staking vault.
    #[sol(rpc)]
    #[derive(Debug)]
    interface IStakingVault {
        function calculateValidatorWithdrawalFee(uint256 numberOfKeys) external view returns (uint256);
    }

    /// Lido dashboard (vault control surface).
    #[derive(Debug)]
    interface IDashboard {
        event NodeOperatorFeeDisbursed(address indexed sender, uint256 fee);
    }

    /// Parameters packed into `IYieldManager.unstake`.
    #[derive(Debug)]
    struct WithdrawalParams {
        bytes pubkeys;
        uint64[] amounts;
        address refundRecipient;
    }
}
