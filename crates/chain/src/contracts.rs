//! Contract interfaces used by the enrichment pipeline.

use alloy::sol;

sol! {
    /// Aave-style price oracle. Both oracle generations expose the same
    /// `getAssetPrice` selector; they differ only in output scaling, which is
    /// handled by the valuation strategies.
    #[sol(rpc)]
    interface IAaveOracle {
        function getAssetPrice(address asset) external view returns (uint256);
    }

    /// Lending pool surface needed for enrichment: the packed reserve
    /// configuration (liquidation incentive bits) and the liquidation event.
    #[sol(rpc)]
    interface ILendingPool {
        function getConfiguration(address asset) external view returns (uint256 data);

        event LiquidationCall(
            address indexed collateralAsset,
            address indexed debtAsset,
            address indexed user,
            uint256 debtToCover,
            uint256 liquidatedCollateralAmount,
            address liquidator,
            bool receiveAToken
        );
    }

    /// Fixed-decimals price feed used on chains without an Aave oracle
    /// (Venus-style deployments).
    #[sol(rpc)]
    interface INativePriceFeed {
        function getPrice(address token) external view returns (uint256);
    }
}
